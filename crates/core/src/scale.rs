//! Pixel-per-unit scale
//!
//! A `Scale` can only hold a positive finite factor, so every conversion
//! downstream divides by a valid number. Invalid operator input is rejected
//! here with a message suitable for display.

use crate::geometry::SurfacePoint;
use std::fmt;
use std::str::FromStr;

/// Scale validation failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScaleError {
    #[error("scale must be a number, got `{0}`")]
    NotANumber(String),

    #[error("scale must be a finite number")]
    NotFinite,

    #[error("scale must be greater than zero, got {0}")]
    NotPositive(f64),

    #[error("calibration points must be distinct")]
    CoincidentPoints,

    #[error("known distance must be greater than zero, got {0}")]
    InvalidDistance(f64),
}

/// Drawing-surface pixels per real-world unit
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Scale(f64);

impl Scale {
    /// One pixel per unit
    pub const UNIT: Scale = Scale(1.0);

    /// Validate a pixel-per-unit factor
    pub fn new(pixels_per_unit: f64) -> Result<Self, ScaleError> {
        if pixels_per_unit.is_nan() {
            return Err(ScaleError::NotANumber(pixels_per_unit.to_string()));
        }
        if pixels_per_unit.is_infinite() {
            return Err(ScaleError::NotFinite);
        }
        if pixels_per_unit <= 0.0 {
            return Err(ScaleError::NotPositive(pixels_per_unit));
        }
        Ok(Self(pixels_per_unit))
    }

    /// Parse operator input such as `"72"` or `" 12.5 "`
    pub fn parse(input: &str) -> Result<Self, ScaleError> {
        let trimmed = input.trim();
        let value: f64 = trimmed
            .parse()
            .map_err(|_| ScaleError::NotANumber(trimmed.to_string()))?;
        Self::new(value)
    }

    /// Two-point calibration: the operator marks two points and enters the
    /// real-world distance between them
    pub fn from_two_points(
        p1: SurfacePoint,
        p2: SurfacePoint,
        known_distance: f64,
    ) -> Result<Self, ScaleError> {
        if !(known_distance > 0.0) || !known_distance.is_finite() {
            return Err(ScaleError::InvalidDistance(known_distance));
        }
        let pixel_distance = p1.distance_to(&p2);
        if pixel_distance <= f64::EPSILON {
            return Err(ScaleError::CoincidentPoints);
        }
        Self::new(pixel_distance / known_distance)
    }

    /// Pixels per real-world unit
    pub fn pixels_per_unit(self) -> f64 {
        self.0
    }

    /// Convert a pixel distance to real-world units
    pub fn to_units(self, pixels: f64) -> f64 {
        pixels / self.0
    }

    /// Convert a pixel area to square real-world units
    pub fn to_square_units(self, square_pixels: f64) -> f64 {
        square_pixels / (self.0 * self.0)
    }

    /// Convert a real-world distance to pixels
    pub fn to_pixels(self, units: f64) -> f64 {
        units * self.0
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::UNIT
    }
}

impl TryFrom<f64> for Scale {
    type Error = ScaleError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Scale> for f64 {
    fn from(scale: Scale) -> Self {
        scale.0
    }
}

impl FromStr for Scale {
    type Err = ScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} px/unit", self.0)
    }
}

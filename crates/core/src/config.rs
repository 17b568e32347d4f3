//! Capture configuration
//!
//! Loaded from disk by `takeoff-storage`; every field has a default so
//! partial files still load.

use crate::scale::Scale;
use serde::{Deserialize, Serialize};

/// Tunables for capture, hit-testing and the initial surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Scale used until the operator sets one
    pub default_scale: Scale,

    /// Hit-test tolerance in surface pixels
    pub hit_tolerance: f64,

    /// Pointer moves closer than this to the previous point are dropped
    pub min_point_spacing: f64,

    /// Radius of count markers in surface pixels
    pub marker_radius: f64,

    /// Initial surface extents
    pub surface_width: f64,
    pub surface_height: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            default_scale: Scale::UNIT,
            hit_tolerance: 4.0,
            min_point_spacing: 0.0,
            marker_radius: 6.0,
            surface_width: 1280.0,
            surface_height: 800.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: CaptureConfig =
            serde_json::from_str(r#"{ "default_scale": 72.0 }"#).expect("valid config");
        assert_eq!(config.default_scale.pixels_per_unit(), 72.0);
        assert_eq!(config.hit_tolerance, CaptureConfig::default().hit_tolerance);
    }

    #[test]
    fn invalid_scale_in_config_is_rejected() {
        assert!(serde_json::from_str::<CaptureConfig>(r#"{ "default_scale": -1 }"#).is_err());
    }
}

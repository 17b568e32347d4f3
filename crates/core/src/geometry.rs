//! Surface geometry and quantity conversion
//!
//! Pure functions turning traced point sequences into real-world quantities.
//! All coordinates are drawing-surface pixels; every quantity leaving this
//! module is rounded to two decimal places.

use crate::scale::Scale;

/// Minimum number of points for an area trace
pub const MIN_AREA_POINTS: usize = 3;

/// Minimum number of points for a linear trace
pub const MIN_LINEAR_POINTS: usize = 2;

/// Quantity contributed by a single count marker
pub const COUNT_UNIT: f64 = 1.0;

/// Polygons enclosing less than this many square pixels are degenerate
const DEGENERATE_AREA_PX: f64 = 1e-6;

/// Pixel coordinate in drawing-surface space
///
/// - Origin (0, 0) at the top-left of the surface
/// - X increases to the right, Y increases downward
/// - Stable across pan and zoom of the host view
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SurfacePoint {
    pub x: f64,
    pub y: f64,
}

impl SurfacePoint {
    /// Create a new surface point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &SurfacePoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Round to two decimal places for display and storage
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Planar area of the implicitly closed ring, in square pixels
///
/// Shoelace formula. Winding direction does not matter. Fewer than three
/// points enclose nothing and yield zero.
pub fn polygon_area_px(points: &[SurfacePoint]) -> f64 {
    let n = points.len();
    if n < MIN_AREA_POINTS {
        return 0.0;
    }

    let mut twice_area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        twice_area += points[i].x * points[j].y;
        twice_area -= points[j].x * points[i].y;
    }
    (twice_area / 2.0).abs()
}

/// Cumulative length along consecutive points, in pixels
pub fn polyline_length_px(points: &[SurfacePoint]) -> f64 {
    points.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

/// Whether a ring is too small or too flat to enclose an area
pub fn is_degenerate_polygon(points: &[SurfacePoint]) -> bool {
    points.len() < MIN_AREA_POINTS || polygon_area_px(points) < DEGENERATE_AREA_PX
}

/// Area in square real-world units
pub fn area_units(points: &[SurfacePoint], scale: Scale) -> f64 {
    round2(scale.to_square_units(polygon_area_px(points)))
}

/// Length in real-world units
pub fn length_units(points: &[SurfacePoint], scale: Scale) -> f64 {
    round2(scale.to_units(polyline_length_px(points)))
}

/// Whether `point` lies within `tolerance` of the segment `start`-`end`
pub fn point_near_segment(
    point: &SurfacePoint,
    start: &SurfacePoint,
    end: &SurfacePoint,
    tolerance: f64,
) -> bool {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-12 {
        return point.distance_to(start) <= tolerance;
    }

    // Project onto the segment
    let t = ((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq;
    let t = t.clamp(0.0, 1.0);

    let closest = SurfacePoint::new(start.x + t * dx, start.y + t * dy);
    point.distance_to(&closest) <= tolerance
}

/// Even-odd containment test against the closed ring
pub fn point_in_polygon(point: &SurfacePoint, ring: &[SurfacePoint]) -> bool {
    let n = ring.len();
    if n < MIN_AREA_POINTS {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (&ring[i], &ring[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let crossing_x = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < crossing_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Point halfway along the path, interpolated within its segment
pub fn path_midpoint(points: &[SurfacePoint]) -> Option<SurfacePoint> {
    let first = *points.first()?;
    let half_length = polyline_length_px(points) / 2.0;

    let mut accumulated = 0.0;
    for window in points.windows(2) {
        let segment_length = window[0].distance_to(&window[1]);
        if segment_length > 0.0 && accumulated + segment_length >= half_length {
            let t = (half_length - accumulated) / segment_length;
            return Some(SurfacePoint::new(
                window[0].x + t * (window[1].x - window[0].x),
                window[0].y + t * (window[1].y - window[0].y),
            ));
        }
        accumulated += segment_length;
    }

    Some(first)
}

/// Average of the vertices
pub fn vertex_centroid(points: &[SurfacePoint]) -> Option<SurfacePoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|p| p.x).sum();
    let sum_y: f64 = points.iter().map(|p| p.y).sum();
    Some(SurfacePoint::new(sum_x / n, sum_y / n))
}

/// Axis-aligned bounds as (min_x, min_y, max_x, max_y)
pub fn bounds(points: &[SurfacePoint]) -> (f64, f64, f64, f64) {
    let Some(first) = points.first() else {
        return (0.0, 0.0, 0.0, 0.0);
    };

    points.iter().skip(1).fold(
        (first.x, first.y, first.x, first.y),
        |(min_x, min_y, max_x, max_y), p| {
            (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f64) -> Vec<SurfacePoint> {
        vec![
            SurfacePoint::new(0.0, 0.0),
            SurfacePoint::new(side, 0.0),
            SurfacePoint::new(side, side),
            SurfacePoint::new(0.0, side),
        ]
    }

    #[test]
    fn test_point_distance() {
        let p1 = SurfacePoint::new(0.0, 0.0);
        let p2 = SurfacePoint::new(3.0, 4.0);
        assert!((p1.distance_to(&p2) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn unit_square_area_is_independent_of_winding() {
        let scale = Scale::new(100.0).expect("valid scale");
        let clockwise = square(100.0);
        let mut counter_clockwise = clockwise.clone();
        counter_clockwise.reverse();

        assert!((area_units(&clockwise, scale) - 1.0).abs() < 1e-9);
        assert!((area_units(&counter_clockwise, scale) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn triangle_area_uses_shoelace() {
        let points = vec![
            SurfacePoint::new(0.0, 0.0),
            SurfacePoint::new(10.0, 0.0),
            SurfacePoint::new(5.0, 10.0),
        ];
        assert!((polygon_area_px(&points) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn colinear_points_length_sums_segments() {
        let scale = Scale::new(100.0).expect("valid scale");
        let points = vec![
            SurfacePoint::new(0.0, 0.0),
            SurfacePoint::new(100.0, 0.0),
            SurfacePoint::new(200.0, 0.0),
        ];
        assert!((length_units(&points, scale) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_polygons_are_detected() {
        assert!(is_degenerate_polygon(&square(10.0)[..2]));
        let colinear = vec![
            SurfacePoint::new(0.0, 0.0),
            SurfacePoint::new(5.0, 5.0),
            SurfacePoint::new(10.0, 10.0),
        ];
        assert!(is_degenerate_polygon(&colinear));
        assert!(!is_degenerate_polygon(&square(10.0)));
    }

    #[test]
    fn results_round_to_two_decimals() {
        assert_eq!(round2(1.234_9), 1.23);
        assert_eq!(round2(1.235_1), 1.24);

        let scale = Scale::new(3.0).expect("valid scale");
        let points = vec![SurfacePoint::new(0.0, 0.0), SurfacePoint::new(10.0, 0.0)];
        assert_eq!(length_units(&points, scale), 3.33);
    }

    #[test]
    fn hit_helpers() {
        let start = SurfacePoint::new(0.0, 0.0);
        let end = SurfacePoint::new(100.0, 0.0);
        assert!(point_near_segment(&SurfacePoint::new(50.0, 3.0), &start, &end, 5.0));
        assert!(!point_near_segment(&SurfacePoint::new(50.0, 8.0), &start, &end, 5.0));

        let ring = square(10.0);
        assert!(point_in_polygon(&SurfacePoint::new(5.0, 5.0), &ring));
        assert!(!point_in_polygon(&SurfacePoint::new(15.0, 5.0), &ring));
    }

    #[test]
    fn midpoint_follows_path_length() {
        let points = vec![
            SurfacePoint::new(0.0, 0.0),
            SurfacePoint::new(100.0, 0.0),
            SurfacePoint::new(100.0, 100.0),
        ];
        assert_eq!(path_midpoint(&points), Some(SurfacePoint::new(100.0, 0.0)));
        assert_eq!(vertex_centroid(&square(60.0)), Some(SurfacePoint::new(30.0, 30.0)));
        assert_eq!(bounds(&points), (0.0, 0.0, 100.0, 100.0));
    }
}

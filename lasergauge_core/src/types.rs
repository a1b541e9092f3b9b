//! Small value types shared across the engine.

use crate::config::Axis;

/// Subpixel image coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance_sq(&self, other: &Point2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Coordinate that moves with height for the given scan axis.
    #[inline]
    pub const fn across(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Y => self.x,
            Axis::X => self.y,
        }
    }
}

/// Signed displacement of `detected` from `zero` across the scan axis.
#[inline]
pub fn pixel_delta(zero: &Point2, detected: &Point2, axis: Axis) -> f64 {
    zero.across(axis) - detected.across(axis)
}

/// One successful height reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub height_mm: f64,
    pub pixel_delta: f64,
    pub point: Point2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_uses_coordinate_across_scan_axis() {
        let zero = Point2::new(640.0, 360.0);
        let seen = Point2::new(630.0, 350.0);
        assert_eq!(pixel_delta(&zero, &seen, Axis::Y), 10.0);
        assert_eq!(pixel_delta(&zero, &seen, Axis::X), 10.0);
        let seen = Point2::new(640.0, 372.5);
        assert_eq!(pixel_delta(&zero, &seen, Axis::Y), 0.0);
        assert_eq!(pixel_delta(&zero, &seen, Axis::X), -12.5);
    }
}

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in normalized [0, 1] space, top-left origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Larger of the two sides; the size measure used by size checks.
    pub fn max_side(&self) -> f64 {
        self.width.max(self.height)
    }

    /// Intersects the rectangle with the unit square.
    ///
    /// Edges are clamped independently, so a box hanging off one side
    /// keeps its visible part instead of being shifted back inside.
    pub fn clamped(&self) -> Self {
        let x0 = clamp_unit(self.x);
        let y0 = clamp_unit(self.y);
        let x1 = clamp_unit(self.right()).max(x0);
        let y1 = clamp_unit(self.bottom()).max(y0);
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Point in normalized [0, 1] space, top-left origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn clamped(&self) -> Self {
        Self::new(clamp_unit(self.x), clamp_unit(self.y))
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_center_and_max_side() {
        let r = NormalizedRect::new(0.2, 0.4, 0.2, 0.4);
        let (cx, cy) = r.center();
        assert_relative_eq!(cx, 0.3, epsilon = 1e-12);
        assert_relative_eq!(cy, 0.6, epsilon = 1e-12);
        assert_relative_eq!(r.max_side(), 0.4);
    }

    #[test]
    fn test_clamped_inside_is_unchanged() {
        let r = NormalizedRect::new(0.125, 0.25, 0.25, 0.5);
        assert_eq!(r.clamped(), r);
    }

    #[test]
    fn test_clamped_keeps_visible_part_on_left_edge() {
        // [-0.1, 0.2] horizontally -> [0.0, 0.2]
        let r = NormalizedRect::new(-0.1, 0.5, 0.3, 0.2).clamped();
        assert_relative_eq!(r.x, 0.0);
        assert_relative_eq!(r.width, 0.2, epsilon = 1e-12);
        assert_relative_eq!(r.y, 0.5);
        assert_relative_eq!(r.height, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_clamped_keeps_visible_part_on_bottom_edge() {
        let r = NormalizedRect::new(0.5, 0.9, 0.2, 0.3).clamped();
        assert_relative_eq!(r.y, 0.9);
        assert_relative_eq!(r.height, 0.1, epsilon = 1e-12);
    }

    #[rstest]
    #[case::fully_left(NormalizedRect::new(-0.5, 0.1, 0.2, 0.2))]
    #[case::fully_below(NormalizedRect::new(0.1, 1.5, 0.2, 0.2))]
    fn test_clamped_outside_collapses_to_zero_size(#[case] r: NormalizedRect) {
        let c = r.clamped();
        assert!(c.width == 0.0 || c.height == 0.0);
        assert!((0.0..=1.0).contains(&c.x));
        assert!((0.0..=1.0).contains(&c.y));
    }

    #[test]
    fn test_clamped_nan_maps_to_zero() {
        let p = NormalizedPoint::new(f64::NAN, 0.5).clamped();
        assert_relative_eq!(p.x, 0.0);
        assert_relative_eq!(p.y, 0.5);
    }

    #[test]
    fn test_serializes_with_width_and_height_keys() {
        let json = serde_json::to_value(NormalizedRect::new(0.1, 0.2, 0.3, 0.4)).unwrap();
        assert_eq!(json["width"], 0.3);
        assert_eq!(json["height"], 0.4);
    }
}

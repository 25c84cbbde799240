use serde::{Deserialize, Serialize};

use crate::shared::geometry::NormalizedRect;

const ALIGNED_FEEDBACK: &str = "Face aligned perfectly";

/// Pose and framing limits. Every bound is inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentThresholds {
    pub max_roll_degrees: f64,
    pub max_pitch_degrees: f64,
    pub max_yaw_degrees: f64,
    /// Bounds on `max(width, height)` of the face box.
    pub min_face_size: f64,
    pub max_face_size: f64,
    pub min_center_x: f64,
    pub max_center_x: f64,
    pub min_center_y: f64,
    pub max_center_y: f64,
}

impl Default for AlignmentThresholds {
    fn default() -> Self {
        Self {
            max_roll_degrees: 15.0,
            max_pitch_degrees: 15.0,
            max_yaw_degrees: 20.0,
            min_face_size: 0.20,
            max_face_size: 0.80,
            min_center_x: 0.35,
            max_center_x: 0.65,
            min_center_y: 0.30,
            max_center_y: 0.70,
        }
    }
}

/// Outcome of one check: `feedback` is set exactly when the check failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentCheck {
    pub is_valid: bool,
    pub feedback: Option<&'static str>,
}

impl AlignmentCheck {
    fn pass() -> Self {
        Self {
            is_valid: true,
            feedback: None,
        }
    }

    fn fail(feedback: &'static str) -> Self {
        Self {
            is_valid: false,
            feedback: Some(feedback),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentResult {
    pub roll: AlignmentCheck,
    pub pitch: AlignmentCheck,
    pub yaw: AlignmentCheck,
    pub size: AlignmentCheck,
    pub centering: AlignmentCheck,
}

impl AlignmentResult {
    pub fn is_valid(&self) -> bool {
        self.checks().iter().all(|c| c.is_valid)
    }

    /// Message of the first failing check in priority order.
    pub fn primary_feedback(&self) -> &'static str {
        self.checks()
            .iter()
            .find_map(|c| c.feedback)
            .unwrap_or(ALIGNED_FEEDBACK)
    }

    /// Every failing check's message, highest priority first.
    pub fn all_feedback(&self) -> Vec<&'static str> {
        self.checks().iter().filter_map(|c| c.feedback).collect()
    }

    fn checks(&self) -> [AlignmentCheck; 5] {
        [self.roll, self.pitch, self.yaw, self.size, self.centering]
    }
}

#[derive(Default)]
pub struct FaceAlignmentValidator {
    thresholds: AlignmentThresholds,
}

impl FaceAlignmentValidator {
    pub fn new(thresholds: AlignmentThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AlignmentThresholds {
        &self.thresholds
    }

    /// Angles in degrees; `bounds` in normalized top-left space.
    pub fn validate(&self, roll: f64, pitch: f64, yaw: f64, bounds: NormalizedRect) -> AlignmentResult {
        let t = &self.thresholds;
        AlignmentResult {
            roll: check_angle(
                roll,
                t.max_roll_degrees,
                "Tilt your head less to the right",
                "Tilt your head less to the left",
            ),
            pitch: check_angle(pitch, t.max_pitch_degrees, "Look down less", "Look up less"),
            yaw: check_angle(
                yaw,
                t.max_yaw_degrees,
                "Turn your head less to the right",
                "Turn your head less to the left",
            ),
            size: self.check_size(bounds),
            centering: self.check_centering(bounds),
        }
    }

    fn check_size(&self, bounds: NormalizedRect) -> AlignmentCheck {
        let size = bounds.max_side();
        if size < self.thresholds.min_face_size {
            AlignmentCheck::fail("Move closer to the camera")
        } else if size > self.thresholds.max_face_size {
            AlignmentCheck::fail("Move farther from the camera")
        } else {
            AlignmentCheck::pass()
        }
    }

    fn check_centering(&self, bounds: NormalizedRect) -> AlignmentCheck {
        let t = &self.thresholds;
        let (center_x, center_y) = bounds.center();
        if center_x < t.min_center_x {
            AlignmentCheck::fail("Move right")
        } else if center_x > t.max_center_x {
            AlignmentCheck::fail("Move left")
        } else if center_y < t.min_center_y {
            AlignmentCheck::fail("Move down")
        } else if center_y > t.max_center_y {
            AlignmentCheck::fail("Move up")
        } else {
            AlignmentCheck::pass()
        }
    }
}

fn check_angle(angle: f64, max: f64, positive: &'static str, negative: &'static str) -> AlignmentCheck {
    if angle.abs() <= max {
        AlignmentCheck::pass()
    } else if angle > 0.0 {
        AlignmentCheck::fail(positive)
    } else {
        AlignmentCheck::fail(negative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn centered(size: f64) -> NormalizedRect {
        NormalizedRect::new(0.5 - size / 2.0, 0.5 - size / 2.0, size, size)
    }

    fn validate(roll: f64, pitch: f64, yaw: f64, bounds: NormalizedRect) -> AlignmentResult {
        FaceAlignmentValidator::default().validate(roll, pitch, yaw, bounds)
    }

    #[test]
    fn test_aligned_face_is_valid() {
        let result = validate(0.0, 0.0, 0.0, centered(0.4));
        assert!(result.is_valid());
        assert_eq!(result.primary_feedback(), "Face aligned perfectly");
        assert!(result.all_feedback().is_empty());
    }

    #[rstest]
    #[case::at_limit(15.0, true)]
    #[case::negative_limit(-15.0, true)]
    #[case::just_over(15.0 + 1e-9, false)]
    #[case::just_under_negative(-15.0 - 1e-9, false)]
    fn test_roll_boundary_is_inclusive(#[case] roll: f64, #[case] valid: bool) {
        let result = validate(roll, 0.0, 0.0, centered(0.4));
        assert_eq!(result.roll.is_valid, valid);
        assert_eq!(result.is_valid(), valid);
    }

    #[rstest]
    #[case::roll_right(20.0, 0.0, 0.0, "Tilt your head less to the right")]
    #[case::roll_left(-20.0, 0.0, 0.0, "Tilt your head less to the left")]
    #[case::pitch_down(0.0, 20.0, 0.0, "Look down less")]
    #[case::pitch_up(0.0, -20.0, 0.0, "Look up less")]
    #[case::yaw_right(0.0, 0.0, 25.0, "Turn your head less to the right")]
    #[case::yaw_left(0.0, 0.0, -25.0, "Turn your head less to the left")]
    fn test_pose_feedback(#[case] roll: f64, #[case] pitch: f64, #[case] yaw: f64, #[case] expected: &str) {
        let result = validate(roll, pitch, yaw, centered(0.4));
        assert!(!result.is_valid());
        assert_eq!(result.primary_feedback(), expected);
    }

    #[test]
    fn test_yaw_allows_wider_range() {
        assert!(validate(0.0, 0.0, 20.0, centered(0.4)).yaw.is_valid);
    }

    #[rstest]
    #[case::too_small(0.1, Some("Move closer to the camera"))]
    #[case::min_edge(0.2, None)]
    #[case::max_edge(0.8, None)]
    #[case::too_large(0.9, Some("Move farther from the camera"))]
    fn test_size_check(#[case] size: f64, #[case] feedback: Option<&str>) {
        let result = validate(0.0, 0.0, 0.0, centered(size));
        assert_eq!(result.size.feedback, feedback);
        assert_eq!(result.size.is_valid, feedback.is_none());
    }

    #[test]
    fn test_size_uses_larger_side() {
        let tall = NormalizedRect::new(0.45, 0.3, 0.1, 0.4);
        assert!(validate(0.0, 0.0, 0.0, tall).size.is_valid);
    }

    #[rstest]
    #[case::left_of_center(NormalizedRect::new(0.0, 0.4, 0.2, 0.2), "Move right")]
    #[case::right_of_center(NormalizedRect::new(0.8, 0.4, 0.2, 0.2), "Move left")]
    #[case::above_center(NormalizedRect::new(0.4, 0.0, 0.2, 0.2), "Move down")]
    #[case::below_center(NormalizedRect::new(0.4, 0.8, 0.2, 0.2), "Move up")]
    fn test_centering_feedback(#[case] bounds: NormalizedRect, #[case] expected: &str) {
        let result = validate(0.0, 0.0, 0.0, bounds);
        assert_eq!(result.centering.feedback, Some(expected));
    }

    #[test]
    fn test_feedback_priority_order() {
        let bounds = NormalizedRect::new(0.0, 0.0, 0.05, 0.05);
        let result = validate(-30.0, 30.0, 40.0, bounds);
        assert_eq!(result.primary_feedback(), "Tilt your head less to the left");
        assert_eq!(
            result.all_feedback(),
            vec![
                "Tilt your head less to the left",
                "Look down less",
                "Turn your head less to the right",
                "Move closer to the camera",
                "Move right",
            ]
        );
    }

    #[test]
    fn test_pitch_failure_outranks_size() {
        let result = validate(0.0, -16.0, 0.0, centered(0.95));
        assert_eq!(result.primary_feedback(), "Look up less");
        assert_eq!(result.all_feedback().len(), 2);
    }

    #[test]
    fn test_custom_thresholds() {
        let validator = FaceAlignmentValidator::new(AlignmentThresholds {
            max_roll_degrees: 5.0,
            ..AlignmentThresholds::default()
        });
        assert!(!validator.validate(10.0, 0.0, 0.0, centered(0.4)).is_valid());
        assert_eq!(validator.thresholds().max_roll_degrees, 5.0);
    }
}

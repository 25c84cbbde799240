use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_FRAME_SKIP_COUNT, DEFAULT_MAX_CONCURRENT_DETECTIONS, DEFAULT_MAX_FACES,
    DEFAULT_MIN_FACE_SIZE, DEFAULT_MOTION_CHECK_INTERVAL_MS, DEFAULT_MOTION_THRESHOLD,
    DEFAULT_PROCESSING_THROTTLE_MS, MAX_CONCURRENT_DETECTIONS_LIMIT,
};

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to read options file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid options JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid option {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Detector speed/accuracy hint. Not interpreted by the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    #[default]
    Fast,
    Accurate,
}

/// Configuration snapshot for one detection session.
///
/// Missing JSON keys take their defaults, so `{}` is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FaceDetectionOptions {
    pub performance_mode: PerformanceMode,
    pub tracking_enabled: bool,
    pub detect_landmarks: bool,
    pub max_faces: usize,
    /// Normalized-width floor; narrower faces are dropped.
    pub min_face_size: f64,
    /// Admit every `(frame_skip_count + 1)`-th frame.
    pub frame_skip_count: u32,
    pub motion_detection_enabled: bool,
    pub processing_throttle_ms: u64,
    pub motion_check_interval_ms: u64,
    pub motion_threshold: f64,
    pub max_concurrent_detections: usize,
}

impl Default for FaceDetectionOptions {
    fn default() -> Self {
        Self {
            performance_mode: PerformanceMode::Fast,
            tracking_enabled: true,
            detect_landmarks: true,
            max_faces: DEFAULT_MAX_FACES,
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            frame_skip_count: DEFAULT_FRAME_SKIP_COUNT,
            motion_detection_enabled: true,
            processing_throttle_ms: DEFAULT_PROCESSING_THROTTLE_MS,
            motion_check_interval_ms: DEFAULT_MOTION_CHECK_INTERVAL_MS,
            motion_threshold: DEFAULT_MOTION_THRESHOLD,
            max_concurrent_detections: DEFAULT_MAX_CONCURRENT_DETECTIONS,
        }
    }
}

impl FaceDetectionOptions {
    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.max_faces == 0 {
            return Err(invalid("maxFaces", "must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.min_face_size) {
            return Err(invalid(
                "minFaceSize",
                format!("must be within [0, 1], got {}", self.min_face_size),
            ));
        }
        if !(0.0..=1.0).contains(&self.motion_threshold) {
            return Err(invalid(
                "motionThreshold",
                format!("must be within [0, 1], got {}", self.motion_threshold),
            ));
        }
        if !(1..=MAX_CONCURRENT_DETECTIONS_LIMIT).contains(&self.max_concurrent_detections) {
            return Err(invalid(
                "maxConcurrentDetections",
                format!(
                    "must be within [1, {MAX_CONCURRENT_DETECTIONS_LIMIT}], got {}",
                    self.max_concurrent_detections
                ),
            ));
        }
        Ok(())
    }

    pub fn processing_throttle(&self) -> Duration {
        Duration::from_millis(self.processing_throttle_ms)
    }

    pub fn motion_check_interval(&self) -> Duration {
        Duration::from_millis(self.motion_check_interval_ms)
    }
}

fn invalid(field: &'static str, reason: String) -> OptionsError {
    OptionsError::Invalid { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_empty_json_gives_defaults() {
        let options = FaceDetectionOptions::from_json("{}").unwrap();
        assert_eq!(options, FaceDetectionOptions::default());
        assert_eq!(options.max_faces, 3);
        assert_eq!(options.frame_skip_count, 2);
        assert!(options.tracking_enabled);
    }

    #[test]
    fn test_partial_json_overrides_named_fields() {
        let options = FaceDetectionOptions::from_json(
            r#"{"performanceMode": "accurate", "maxFaces": 1, "minFaceSize": 0.1, "trackingEnabled": false}"#,
        )
        .unwrap();
        assert_eq!(options.performance_mode, PerformanceMode::Accurate);
        assert_eq!(options.max_faces, 1);
        assert!(!options.tracking_enabled);
        assert!(options.detect_landmarks);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = FaceDetectionOptions::from_json("{maxFaces:").unwrap_err();
        assert!(matches!(err, OptionsError::Parse(_)));
    }

    #[rstest]
    #[case::zero_faces(r#"{"maxFaces": 0}"#, "maxFaces")]
    #[case::min_size_above_one(r#"{"minFaceSize": 1.5}"#, "minFaceSize")]
    #[case::negative_min_size(r#"{"minFaceSize": -0.1}"#, "minFaceSize")]
    #[case::motion_threshold(r#"{"motionThreshold": 2.0}"#, "motionThreshold")]
    #[case::zero_concurrency(r#"{"maxConcurrentDetections": 0}"#, "maxConcurrentDetections")]
    #[case::runaway_concurrency(r#"{"maxConcurrentDetections": 100000}"#, "maxConcurrentDetections")]
    fn test_invalid_values_are_rejected(#[case] json: &str, #[case] expected_field: &str) {
        match FaceDetectionOptions::from_json(json) {
            Err(OptionsError::Invalid { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected Invalid error, got {other:?}"),
        }
    }

    #[test]
    fn test_concurrency_limit_is_accepted() {
        let json = format!(r#"{{"maxConcurrentDetections": {MAX_CONCURRENT_DETECTIONS_LIMIT}}}"#);
        let options = FaceDetectionOptions::from_json(&json).unwrap();
        assert_eq!(options.max_concurrent_detections, MAX_CONCURRENT_DETECTIONS_LIMIT);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"frameSkipCount": 0, "motionDetectionEnabled": false}}"#).unwrap();
        let options = FaceDetectionOptions::load(file.path()).unwrap();
        assert_eq!(options.frame_skip_count, 0);
        assert!(!options.motion_detection_enabled);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FaceDetectionOptions::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, OptionsError::Io(_)));
    }

    #[test]
    fn test_durations() {
        let options = FaceDetectionOptions::default();
        assert_eq!(options.processing_throttle(), Duration::from_millis(33));
        assert_eq!(options.motion_check_interval(), Duration::from_millis(100));
    }
}

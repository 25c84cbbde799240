use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::face_detector::{DetectorError, FaceDetector};
use crate::detection::domain::raw_observation::{DetectorConventions, RawObservation};
use crate::shared::frame::{PixelFormat, RawFrame, Rotation};

const DEFAULT_LUMA: u8 = 128;

#[derive(Debug, Error)]
pub enum ReplayScriptError {
    #[error("failed to read replay script: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid replay script: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One recorded frame: what the detector saw and what it answered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayFrame {
    pub timestamp_ms: u64,
    /// Uniform luma used when synthesizing the frame.
    #[serde(default = "default_luma")]
    pub luma: u8,
    #[serde(default)]
    pub observations: Vec<RawObservation>,
    /// When set, the detector fails this frame with the message.
    #[serde(default)]
    pub error: Option<String>,
}

fn default_luma() -> u8 {
    DEFAULT_LUMA
}

/// A recorded detector session, loadable from JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayScript {
    pub frame_width: u32,
    pub frame_height: u32,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub conventions: DetectorConventions,
    pub frames: Vec<ReplayFrame>,
}

impl ReplayScript {
    pub fn from_json(json: &str) -> Result<Self, ReplayScriptError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ReplayScriptError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Synthesizes a planar-luma camera frame for each recorded entry, in order.
    pub fn frames(&self) -> impl Iterator<Item = RawFrame> + '_ {
        let len = self.frame_width as usize * self.frame_height as usize;
        self.frames.iter().map(move |f| {
            RawFrame::new(
                vec![f.luma; len],
                self.frame_width,
                self.frame_height,
                PixelFormat::PlanarLumaChroma,
                self.rotation,
                f.timestamp_ms,
            )
        })
    }
}

/// Replays recorded observations keyed by frame timestamp.
///
/// Frames the script does not mention yield no faces.
pub struct ReplayFaceDetector {
    frames: HashMap<u64, ReplayFrame>,
    conventions: DetectorConventions,
}

impl ReplayFaceDetector {
    pub fn new(script: &ReplayScript) -> Self {
        Self {
            frames: script
                .frames
                .iter()
                .map(|f| (f.timestamp_ms, f.clone()))
                .collect(),
            conventions: script.conventions,
        }
    }

    pub fn shared(script: &ReplayScript) -> Arc<dyn FaceDetector> {
        Arc::new(Self::new(script))
    }
}

impl FaceDetector for ReplayFaceDetector {
    fn detect(&self, frame: &RawFrame) -> Result<Vec<RawObservation>, DetectorError> {
        match self.frames.get(&frame.timestamp_ms()) {
            Some(ReplayFrame {
                error: Some(message),
                ..
            }) => Err(DetectorError::Failed(message.clone())),
            Some(recorded) => Ok(recorded.observations.clone()),
            None => Ok(Vec::new()),
        }
    }

    fn conventions(&self) -> DetectorConventions {
        self.conventions
    }

    fn close(&self) {
        log::debug!("Replay detector closed ({} recorded frames)", self.frames.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::raw_observation::{BoxUnits, Origin};

    const SCRIPT: &str = r#"{
        "frameWidth": 64,
        "frameHeight": 48,
        "rotation": 90,
        "conventions": { "origin": "bottomLeft", "units": "normalized" },
        "frames": [
            {
                "timestampMs": 0,
                "observations": [
                    { "bounds": { "x": 0.1, "y": 0.2, "width": 0.3, "height": 0.3 }, "trackingHandle": 42 }
                ]
            },
            { "timestampMs": 33, "luma": 20 },
            { "timestampMs": 66, "error": "model crashed" }
        ]
    }"#;

    fn frame(timestamp_ms: u64) -> RawFrame {
        RawFrame::new(vec![0; 4], 2, 2, PixelFormat::PlanarLumaChroma, Rotation::Deg0, timestamp_ms)
    }

    #[test]
    fn test_parses_script() {
        let script = ReplayScript::from_json(SCRIPT).unwrap();
        assert_eq!(script.rotation, Rotation::Deg90);
        assert_eq!(script.conventions.origin, Origin::BottomLeft);
        assert_eq!(script.conventions.units, BoxUnits::Normalized);
        assert_eq!(script.frames.len(), 3);
        assert_eq!(script.frames[0].luma, DEFAULT_LUMA);
        assert_eq!(script.frames[1].luma, 20);
    }

    #[test]
    fn test_returns_recorded_observations_for_known_frame() {
        let detector = ReplayFaceDetector::new(&ReplayScript::from_json(SCRIPT).unwrap());
        let result = detector.detect(&frame(0)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].tracking_handle.map(|h| h.0), Some(42));
    }

    #[test]
    fn test_returns_empty_for_unknown_frame() {
        let detector = ReplayFaceDetector::new(&ReplayScript::from_json(SCRIPT).unwrap());
        assert!(detector.detect(&frame(5)).unwrap().is_empty());
        assert!(detector.detect(&frame(33)).unwrap().is_empty());
    }

    #[test]
    fn test_recorded_error_fails_frame() {
        let detector = ReplayFaceDetector::new(&ReplayScript::from_json(SCRIPT).unwrap());
        let err = detector.detect(&frame(66)).unwrap_err();
        assert_eq!(err.to_string(), "model crashed");
    }

    #[test]
    fn test_reports_script_conventions() {
        let script = ReplayScript::from_json(SCRIPT).unwrap();
        assert_eq!(ReplayFaceDetector::new(&script).conventions(), script.conventions);
    }

    #[test]
    fn test_synthesized_frames_follow_script() {
        let script = ReplayScript::from_json(SCRIPT).unwrap();
        let frames: Vec<RawFrame> = script.frames().collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].timestamp_ms(), 33);
        assert_eq!(frames[1].rotation(), Rotation::Deg90);
        assert_eq!(frames[1].data().len(), 64 * 48);
        assert!(frames[1].data().iter().all(|&v| v == 20));
    }

    #[test]
    fn test_malformed_script_is_parse_error() {
        assert!(matches!(
            ReplayScript::from_json(r#"{"frames": 3}"#),
            Err(ReplayScriptError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ReplayScript::load(&dir.path().join("missing.json")),
            Err(ReplayScriptError::Io(_))
        ));
    }
}

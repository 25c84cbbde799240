use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::shared::geometry::{NormalizedPoint, NormalizedRect};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LandmarkKind {
    LeftEye,
    RightEye,
    NoseBase,
    MouthLeft,
    MouthRight,
    MouthBottom,
    LeftEar,
    RightEar,
    LeftCheek,
    RightCheek,
}

pub type Landmarks = BTreeMap<LandmarkKind, NormalizedPoint>;

/// Detector-dependent classification probabilities, each in [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classifications {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smiling_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_eye_open_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_eye_open_probability: Option<f64>,
}

impl Classifications {
    pub fn is_empty(&self) -> bool {
        self.smiling_probability.is_none()
            && self.left_eye_open_probability.is_none()
            && self.right_eye_open_probability.is_none()
    }
}

/// Canonical per-frame face record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFace {
    /// `None` when tracking is disabled or the detector gave no handle.
    pub tracking_id: Option<u32>,
    pub bounds: NormalizedRect,
    pub roll_angle: f64,
    pub yaw_angle: f64,
    pub pitch_angle: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<Landmarks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifications: Option<Classifications>,
}

/// Faces found in one admitted frame, in detector order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceDetectionResult {
    pub faces: Vec<DetectedFace>,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Source frame timestamp; compare to discard stale deliveries.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
}

impl FaceDetectionResult {
    /// True when `self` came from a strictly older frame than `other`.
    pub fn is_older_than(&self, other: &FaceDetectionResult) -> bool {
        self.timestamp_ms < other.timestamp_ms
    }
}

use serde::{Deserialize, Serialize};

use super::detected_face::LandmarkKind;

/// Vertical origin of the detector's coordinate system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    #[default]
    TopLeft,
    BottomLeft,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BoxUnits {
    #[default]
    Pixels,
    Normalized,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AngleUnit {
    #[default]
    Degrees,
    Radians,
}

/// Where landmark coordinates are expressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LandmarkSpace {
    /// Same units and origin as the bounding box.
    #[default]
    Frame,
    /// Fractions of the bounding box, measured from its origin corner.
    BoxRelative,
}

/// How a particular detector reports geometry. Constant for a detector's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectorConventions {
    pub origin: Origin,
    pub units: BoxUnits,
    pub angle_unit: AngleUnit,
    pub landmark_space: LandmarkSpace,
}

/// Opaque per-face continuity handle issued by the detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingHandle(pub i64);

/// Bounding box in the detector's own units and origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RawBox {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawLandmark {
    pub kind: LandmarkKind,
    pub x: f64,
    pub y: f64,
}

/// Detector-native output for one face. Immutable once produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawObservation {
    pub bounds: RawBox,
    pub landmarks: Vec<RawLandmark>,
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
    pub tracking_handle: Option<TrackingHandle>,
    pub smiling_probability: Option<f64>,
    pub left_eye_open_probability: Option<f64>,
    pub right_eye_open_probability: Option<f64>,
}

impl RawObservation {
    pub fn new(bounds: RawBox) -> Self {
        Self {
            bounds,
            ..Self::default()
        }
    }

    pub fn with_tracking_handle(mut self, handle: i64) -> Self {
        self.tracking_handle = Some(TrackingHandle(handle));
        self
    }

    pub fn with_angles(mut self, roll: f64, pitch: f64, yaw: f64) -> Self {
        self.roll = Some(roll);
        self.pitch = Some(pitch);
        self.yaw = Some(yaw);
        self
    }

    pub fn with_landmark(mut self, kind: LandmarkKind, x: f64, y: f64) -> Self {
        self.landmarks.push(RawLandmark { kind, x, y });
        self
    }
}

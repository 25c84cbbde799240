use std::sync::Arc;

use thiserror::Error;

use crate::pipeline::face_detection_options::FaceDetectionOptions;
use crate::shared::frame::RawFrame;

use super::raw_observation::{DetectorConventions, RawObservation};

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("{0}")]
    Failed(String),
    #[error("detector unavailable: {0}")]
    Unavailable(String),
}

/// Capability interface over the platform face detector.
///
/// The scheduler may call `detect` from several worker threads at once,
/// hence `&self` and `Sync`. Implementations that keep per-call state must
/// synchronize it themselves.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &RawFrame) -> Result<Vec<RawObservation>, DetectorError>;

    /// Geometry conventions of the observations this detector returns.
    fn conventions(&self) -> DetectorConventions {
        DetectorConventions::default()
    }

    /// Releases detector resources at session end. Calls that are still
    /// running when this is invoked may fail or return nothing.
    fn close(&self) {}
}

/// Builds a detector for one session from that session's options.
pub type DetectorFactory =
    Box<dyn Fn(&FaceDetectionOptions) -> Result<Arc<dyn FaceDetector>, DetectorError> + Send + Sync>;

use crate::pipeline::face_detection_options::FaceDetectionOptions;
use crate::shared::geometry::{NormalizedPoint, NormalizedRect};

use super::detected_face::{Classifications, DetectedFace, Landmarks};
use super::raw_observation::{
    AngleUnit, BoxUnits, DetectorConventions, LandmarkSpace, Origin, RawLandmark, RawObservation,
};
use super::tracking_table::TrackingTable;

/// Converts detector-native observations into canonical [`DetectedFace`]s.
///
/// Owns the session's tracking table, so it must live on a single serial
/// context (the result-assembly thread) for the whole session.
pub struct FaceObservationAdapter {
    conventions: DetectorConventions,
    tracking: TrackingTable,
}

impl FaceObservationAdapter {
    pub fn new(conventions: DetectorConventions) -> Self {
        Self {
            conventions,
            tracking: TrackingTable::new(),
        }
    }

    /// Normalizes each box, size-filters on the clamped width, truncates to
    /// `max_faces`, then builds the survivors.
    ///
    /// Detector order is preserved; nothing is re-sorted.
    pub fn adapt(
        &mut self,
        raw: &[RawObservation],
        frame_width: u32,
        frame_height: u32,
        options: &FaceDetectionOptions,
    ) -> Vec<DetectedFace> {
        let Some(scale) = self.unit_scale(frame_width, frame_height) else {
            log::warn!("Dropping observations for zero-sized frame {frame_width}x{frame_height}");
            return Vec::new();
        };

        // Filter on what is delivered: a box hanging off the frame shrinks when clamped.
        let kept: Vec<(&RawObservation, NormalizedRect)> = raw
            .iter()
            .map(|obs| (obs, self.normalize_box(obs, scale)))
            .filter(|(_, bounds)| bounds.width >= options.min_face_size)
            .take(options.max_faces)
            .collect();

        kept.into_iter()
            .map(|(obs, bounds)| self.build_face(obs, bounds, scale, options))
            .collect()
    }

    pub fn tracking_table(&self) -> &TrackingTable {
        &self.tracking
    }

    /// Divisors that bring detector units into [0, 1].
    fn unit_scale(&self, frame_width: u32, frame_height: u32) -> Option<(f64, f64)> {
        match self.conventions.units {
            BoxUnits::Normalized => Some((1.0, 1.0)),
            BoxUnits::Pixels if frame_width == 0 || frame_height == 0 => None,
            BoxUnits::Pixels => Some((frame_width as f64, frame_height as f64)),
        }
    }

    fn build_face(
        &mut self,
        obs: &RawObservation,
        bounds: NormalizedRect,
        scale: (f64, f64),
        options: &FaceDetectionOptions,
    ) -> DetectedFace {
        let tracking_id = if options.tracking_enabled {
            obs.tracking_handle.map(|h| self.tracking.resolve(h))
        } else {
            None
        };

        let landmarks = if options.detect_landmarks && !obs.landmarks.is_empty() {
            Some(self.normalize_landmarks(obs, scale))
        } else {
            None
        };

        let classifications = Classifications {
            smiling_probability: obs.smiling_probability,
            left_eye_open_probability: obs.left_eye_open_probability,
            right_eye_open_probability: obs.right_eye_open_probability,
        };

        DetectedFace {
            tracking_id,
            bounds,
            roll_angle: self.to_degrees(obs.roll),
            yaw_angle: self.to_degrees(obs.yaw),
            pitch_angle: self.to_degrees(obs.pitch),
            landmarks,
            classifications: (!classifications.is_empty()).then_some(classifications),
        }
    }

    fn normalize_box(&self, obs: &RawObservation, (sx, sy): (f64, f64)) -> NormalizedRect {
        let b = obs.bounds;
        let (x, y, w, h) = (b.x / sx, b.y / sy, b.width / sx, b.height / sy);
        let y = match self.conventions.origin {
            Origin::TopLeft => y,
            Origin::BottomLeft => 1.0 - y - h,
        };
        NormalizedRect::new(x, y, w, h).clamped()
    }

    fn normalize_landmarks(&self, obs: &RawObservation, (sx, sy): (f64, f64)) -> Landmarks {
        // Box in normalized units, still in the detector's vertical orientation.
        let b = obs.bounds;
        let (bx, by, bw, bh) = (b.x / sx, b.y / sy, b.width / sx, b.height / sy);

        obs.landmarks
            .iter()
            .map(|lm: &RawLandmark| {
                let (x, y) = match self.conventions.landmark_space {
                    LandmarkSpace::Frame => (lm.x / sx, lm.y / sy),
                    LandmarkSpace::BoxRelative => (bx + lm.x * bw, by + lm.y * bh),
                };
                let y = match self.conventions.origin {
                    Origin::TopLeft => y,
                    Origin::BottomLeft => 1.0 - y,
                };
                (lm.kind, NormalizedPoint::new(x, y).clamped())
            })
            .collect()
    }

    fn to_degrees(&self, angle: Option<f64>) -> f64 {
        let angle = angle.unwrap_or(0.0);
        match self.conventions.angle_unit {
            AngleUnit::Degrees => angle,
            AngleUnit::Radians => angle.to_degrees(),
        }
    }
}

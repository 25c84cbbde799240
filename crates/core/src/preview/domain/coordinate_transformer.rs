//! Sensor-space to preview-space mapping.
//!
//! Input rectangles are normalized and top-left origin in the sensor's own
//! orientation. Output is normalized to the preview surface after rotation
//! and aspect-ratio fitting. Everything here is pure; callers re-run it per
//! face per result because the preview may be resized between frames.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::frame::Rotation;
use crate::shared::geometry::{NormalizedPoint, NormalizedRect};

/// How a frame is fitted onto a preview of a different aspect ratio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    /// Letterbox/pillarbox; the whole frame stays visible.
    #[default]
    Fit,
    /// Crop; the preview is fully covered.
    Fill,
    Stretch,
}

impl FromStr for FillMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fit" => Ok(FillMode::Fit),
            "fill" => Ok(FillMode::Fill),
            "stretch" => Ok(FillMode::Stretch),
            other => Err(format!("unknown fill mode '{other}' (expected fit, fill or stretch)")),
        }
    }
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillMode::Fit => write!(f, "fit"),
            FillMode::Fill => write!(f, "fill"),
            FillMode::Stretch => write!(f, "stretch"),
        }
    }
}

/// On-screen surface the overlay is drawn on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSurface {
    pub width: u32,
    pub height: u32,
    pub fill_mode: FillMode,
}

impl PreviewSurface {
    pub fn new(width: u32, height: u32, fill_mode: FillMode) -> Self {
        Self {
            width,
            height,
            fill_mode,
        }
    }
}

/// Per-axis scale and offset applied after rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisMapping {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl AxisMapping {
    pub const IDENTITY: AxisMapping = AxisMapping {
        scale_x: 1.0,
        scale_y: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    fn apply(&self, r: NormalizedRect) -> NormalizedRect {
        NormalizedRect::new(
            r.x * self.scale_x + self.offset_x,
            r.y * self.scale_y + self.offset_y,
            r.width * self.scale_x,
            r.height * self.scale_y,
        )
    }
}

/// Remaps a normalized rectangle for a sensor rotation.
pub fn rotate_rect(r: NormalizedRect, rotation: Rotation) -> NormalizedRect {
    let NormalizedRect {
        x,
        y,
        width: w,
        height: h,
    } = r;
    match rotation {
        Rotation::Deg0 => r,
        Rotation::Deg90 => NormalizedRect::new(y, 1.0 - x - w, h, w),
        Rotation::Deg180 => NormalizedRect::new(1.0 - x - w, 1.0 - y - h, w, h),
        Rotation::Deg270 => NormalizedRect::new(1.0 - y - h, x, h, w),
    }
}

/// Scale/offset fitting a frame of `frame_aspect` (already rotation-adjusted)
/// onto a preview of `preview_aspect`.
pub fn axis_mapping(frame_aspect: f64, preview_aspect: f64, fill_mode: FillMode) -> AxisMapping {
    match fill_mode {
        FillMode::Stretch => AxisMapping::IDENTITY,
        FillMode::Fit if frame_aspect > preview_aspect => {
            let scale_x = preview_aspect / frame_aspect;
            AxisMapping {
                scale_x,
                scale_y: 1.0,
                offset_x: (1.0 - scale_x) / 2.0,
                offset_y: 0.0,
            }
        }
        FillMode::Fit => {
            let scale_y = frame_aspect / preview_aspect;
            AxisMapping {
                scale_x: 1.0,
                scale_y,
                offset_x: 0.0,
                offset_y: (1.0 - scale_y) / 2.0,
            }
        }
        FillMode::Fill if frame_aspect > preview_aspect => {
            let scale_x = frame_aspect / preview_aspect;
            AxisMapping {
                scale_x,
                scale_y: 1.0,
                offset_x: -(scale_x - 1.0) / 2.0,
                offset_y: 0.0,
            }
        }
        FillMode::Fill => {
            let scale_y = preview_aspect / frame_aspect;
            AxisMapping {
                scale_x: 1.0,
                scale_y,
                offset_x: 0.0,
                offset_y: -(scale_y - 1.0) / 2.0,
            }
        }
    }
}

/// Maps a sensor-normalized rectangle into preview-normalized space.
///
/// Degenerate frame or preview sizes fall back to rotation only.
#[allow(clippy::too_many_arguments)]
pub fn transform_bounds(
    rect: NormalizedRect,
    rotation: Rotation,
    frame_width: u32,
    frame_height: u32,
    preview_width: u32,
    preview_height: u32,
    fill_mode: FillMode,
) -> NormalizedRect {
    let rotated = rotate_rect(rect, rotation);

    if frame_width == 0 || frame_height == 0 || preview_width == 0 || preview_height == 0 {
        return rotated.clamped();
    }

    let frame_aspect = if rotation.swaps_axes() {
        frame_height as f64 / frame_width as f64
    } else {
        frame_width as f64 / frame_height as f64
    };
    let preview_aspect = preview_width as f64 / preview_height as f64;

    axis_mapping(frame_aspect, preview_aspect, fill_mode)
        .apply(rotated)
        .clamped()
}

/// [`transform_bounds`] for a zero-sized rectangle.
#[allow(clippy::too_many_arguments)]
pub fn transform_point(
    point: NormalizedPoint,
    rotation: Rotation,
    frame_width: u32,
    frame_height: u32,
    preview_width: u32,
    preview_height: u32,
    fill_mode: FillMode,
) -> NormalizedPoint {
    let r = transform_bounds(
        NormalizedRect::new(point.x, point.y, 0.0, 0.0),
        rotation,
        frame_width,
        frame_height,
        preview_width,
        preview_height,
        fill_mode,
    );
    NormalizedPoint::new(r.x, r.y)
}

/// Binds the frame geometry and a preview surface for repeated use within one result.
pub struct CoordinateTransformer {
    rotation: Rotation,
    frame_width: u32,
    frame_height: u32,
    surface: PreviewSurface,
}

impl CoordinateTransformer {
    pub fn new(rotation: Rotation, frame_width: u32, frame_height: u32, surface: PreviewSurface) -> Self {
        log::trace!(
            "Transformer: frame={frame_width}x{frame_height}, preview={}x{} ({}), rotation={rotation}",
            surface.width,
            surface.height,
            surface.fill_mode
        );
        Self {
            rotation,
            frame_width,
            frame_height,
            surface,
        }
    }

    pub fn transform_bounds(&self, rect: NormalizedRect) -> NormalizedRect {
        transform_bounds(
            rect,
            self.rotation,
            self.frame_width,
            self.frame_height,
            self.surface.width,
            self.surface.height,
            self.surface.fill_mode,
        )
    }

    pub fn transform_point(&self, point: NormalizedPoint) -> NormalizedPoint {
        transform_point(
            point,
            self.rotation,
            self.frame_width,
            self.frame_height,
            self.surface.width,
            self.surface.height,
            self.surface.fill_mode,
        )
    }
}

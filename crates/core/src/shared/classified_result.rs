use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::geometry::bounding_box::BoundingBox;

/// Box color, derived from the accepted label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorCategory {
    /// The alert class (unmasked face) was accepted.
    Alert,
    /// Any other class was accepted.
    Clear,
    /// No classification reached the acceptance threshold.
    Unknown,
}

/// One face's outcome for one frame, ready for the renderer.
///
/// `location` is in sensor space, already mirrored for front cameras.
/// `confidence` is `None` when the label was rejected, so low-confidence
/// guesses never reach the display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedResult {
    pub frame_id: u64,
    pub face_id: u32,
    pub location: BoundingBox,
    pub label: String,
    pub confidence: Option<f32>,
    pub color: ColorCategory,
    pub captured_at: SystemTime,
}

impl ClassifiedResult {
    pub fn is_labeled(&self) -> bool {
        !self.label.is_empty()
    }
}

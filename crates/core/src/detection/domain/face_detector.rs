use crate::shared::frame::Frame;

use super::face_observation::FaceObservation;

/// Domain interface for face detection on crop-space images.
///
/// Results carry no ordering guarantee and may be empty. Implementations
/// may be stateful, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, image: &Frame) -> Result<Vec<FaceObservation>, Box<dyn std::error::Error>>;
}

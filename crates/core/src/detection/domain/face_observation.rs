use crate::geometry::bounding_box::BoundingBox;

/// One detector hit for one frame, with its box in crop space.
///
/// Lives only for the frame it was detected in.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceObservation {
    /// Opaque detector-assigned id, unique within the frame.
    pub id: u32,
    pub bbox: BoundingBox,
}

impl FaceObservation {
    pub fn new(id: u32, bbox: BoundingBox) -> Self {
        Self { id, bbox }
    }
}

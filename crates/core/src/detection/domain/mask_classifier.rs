use crate::shared::frame::Frame;

/// One ranked classifier output.
#[derive(Clone, Debug, PartialEq)]
pub struct Recognition {
    pub label: String,
    pub confidence: f32,
}

impl Recognition {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Domain interface for mask classification of a single face.
///
/// `face` is a fixed-size square in classifier-input space. Results are
/// ranked best first; callers only consult the first entry.
pub trait MaskClassifier: Send {
    fn classify(&mut self, face: &Frame) -> Result<Vec<Recognition>, Box<dyn std::error::Error>>;
}

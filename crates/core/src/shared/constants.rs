/// Preview resolution requested from the capture source.
pub const DEFAULT_PREVIEW_WIDTH: u32 = 800;
pub const DEFAULT_PREVIEW_HEIGHT: u32 = 600;

/// Detector input is the rotation-corrected preview scaled by this factor on
/// each axis, trading detection accuracy for throughput.
pub const DEFAULT_CROP_FACTOR: f64 = 0.5;

/// Minimum classifier confidence for a label to be shown.
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f32 = 0.6;

/// Side of the square mask-classifier input.
pub const DEFAULT_MODEL_INPUT_SIZE: u32 = 224;

/// Classifier label that maps to the alert color.
pub const DEFAULT_ALERT_LABEL: &str = "no_mask";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

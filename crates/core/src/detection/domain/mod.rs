pub mod face_detector;
pub mod face_observation;
pub mod mask_classifier;

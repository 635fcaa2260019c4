use thiserror::Error;

use crate::geometry::error::GeometryError;

/// Why a worker cycle produced no results. Every variant is recovered
/// locally: the frame publishes an empty set and the next frame proceeds.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("face detector failed: {0}")]
    Detector(String),

    #[error("mask classifier failed: {0}")]
    Classifier(String),
}

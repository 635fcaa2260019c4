use thiserror::Error;

use super::coordinate_space::SpaceId;

/// Failures raised while building or applying the coordinate-space chain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// Non-positive preview, crop or classifier dimensions. Fatal to session
    /// construction.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The transform collapses at least one axis and has no inverse.
    #[error("transform is singular (determinant {determinant:e})")]
    SingularTransform { determinant: f64 },

    #[error("no transform registered from {from} to {to}")]
    UnknownTransform { from: SpaceId, to: SpaceId },
}

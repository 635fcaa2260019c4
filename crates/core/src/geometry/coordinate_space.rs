use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::GeometryError;

/// The four pixel frames a face box travels through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceId {
    /// Raw camera preview buffer, before rotation correction.
    Sensor,
    /// Reduced-resolution, rotation-corrected frame fed to the detector.
    Crop,
    /// Rotation-corrected full-resolution frame.
    Portrait,
    /// Fixed-size square fed to the mask classifier.
    ClassifierInput,
}

impl SpaceId {
    pub const ALL: &[SpaceId] = &[
        SpaceId::Sensor,
        SpaceId::Crop,
        SpaceId::Portrait,
        SpaceId::ClassifierInput,
    ];
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpaceId::Sensor => write!(f, "sensor"),
            SpaceId::Crop => write!(f, "crop"),
            SpaceId::Portrait => write!(f, "portrait"),
            SpaceId::ClassifierInput => write!(f, "classifier-input"),
        }
    }
}

/// A named pixel frame with fixed, positive dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateSpace {
    id: SpaceId,
    width: u32,
    height: u32,
}

impl CoordinateSpace {
    pub fn new(id: SpaceId, width: u32, height: u32) -> Result<Self, GeometryError> {
        if width == 0 || height == 0 {
            return Err(GeometryError::InvalidGeometry(format!(
                "{id} space must have positive dimensions, got {width}x{height}"
            )));
        }
        Ok(Self { id, width, height })
    }

    pub fn id(&self) -> SpaceId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_new_accepts_positive_dimensions() {
        let space = CoordinateSpace::new(SpaceId::Crop, 300, 400).unwrap();
        assert_eq!(space.id(), SpaceId::Crop);
        assert_eq!(space.dimensions(), (300, 400));
    }

    #[rstest]
    #[case(0, 400)]
    #[case(300, 0)]
    #[case(0, 0)]
    fn test_new_rejects_zero_dimensions(#[case] width: u32, #[case] height: u32) {
        let err = CoordinateSpace::new(SpaceId::Sensor, width, height).unwrap_err();
        assert!(matches!(err, GeometryError::InvalidGeometry(_)));
        assert!(err.to_string().contains("sensor"));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(SpaceId::ClassifierInput.to_string(), "classifier-input");
        assert_eq!(SpaceId::Portrait.to_string(), "portrait");
    }
}

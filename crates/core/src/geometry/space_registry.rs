use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::coordinate_space::{CoordinateSpace, SpaceId};
use super::error::GeometryError;
use super::transform::{rotated_dimensions, Transform};
use crate::shared::config::PipelineConfig;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

static IDENTITY: Transform = Transform::identity();

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    Front,
    Back,
}

/// Capture geometry reported when the preview size is chosen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionParams {
    pub preview_width: u32,
    pub preview_height: u32,
    /// Sensor mounting rotation in degrees.
    pub capture_rotation: i32,
    /// Current display rotation in degrees.
    pub screen_orientation: i32,
    pub facing: CameraFacing,
}

/// Rotation from sensor to display, wrapped to `[0, 360)`.
pub fn sensor_orientation(capture_rotation: i32, screen_orientation: i32) -> u32 {
    (capture_rotation - screen_orientation).rem_euclid(360) as u32
}

/// Explicit table of named transforms between coordinate spaces.
///
/// Every registered transform is stored together with its inverse, so a
/// pair is either fully present in both directions or absent.
#[derive(Clone, Debug, Default)]
pub struct TransformTable {
    entries: HashMap<(SpaceId, SpaceId), Transform>,
}

impl TransformTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `from → to` and its inverse. Fails without modifying the
    /// table when `transform` is singular.
    pub fn insert(
        &mut self,
        from: SpaceId,
        to: SpaceId,
        transform: Transform,
    ) -> Result<(), GeometryError> {
        let inverse = transform.invert()?;
        self.entries.insert((from, to), transform);
        self.entries.insert((to, from), inverse);
        Ok(())
    }

    pub fn get(&self, from: SpaceId, to: SpaceId) -> Result<&Transform, GeometryError> {
        if from == to {
            return Ok(&IDENTITY);
        }
        self.entries
            .get(&(from, to))
            .ok_or(GeometryError::UnknownTransform { from, to })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Geometry of one preview configuration: the four coordinate spaces and
/// the transforms between them. Owns no pixel buffers.
///
/// Immutable once built; a preview reconfiguration builds a new session
/// with a higher [`generation`](Self::generation).
#[derive(Clone, Debug)]
pub struct PipelineSession {
    generation: u64,
    sensor: CoordinateSpace,
    crop: CoordinateSpace,
    portrait: CoordinateSpace,
    classifier_input: CoordinateSpace,
    sensor_orientation: u32,
    facing: CameraFacing,
    transforms: TransformTable,
}

impl PipelineSession {
    pub fn new(params: &SessionParams, config: &PipelineConfig) -> Result<Self, GeometryError> {
        let (pw, ph) = (params.preview_width, params.preview_height);
        let sensor = CoordinateSpace::new(SpaceId::Sensor, pw, ph)?;

        let orientation = sensor_orientation(params.capture_rotation, params.screen_orientation);
        let (target_w, target_h) = rotated_dimensions(pw, ph, orientation as i32);
        let portrait = CoordinateSpace::new(SpaceId::Portrait, target_w, target_h)?;

        if !(config.crop_factor > 0.0 && config.crop_factor <= 1.0) {
            return Err(GeometryError::InvalidGeometry(format!(
                "crop factor must be in (0, 1], got {}",
                config.crop_factor
            )));
        }
        let crop = CoordinateSpace::new(
            SpaceId::Crop,
            (target_w as f64 * config.crop_factor) as u32,
            (target_h as f64 * config.crop_factor) as u32,
        )?;
        let classifier_input = CoordinateSpace::new(
            SpaceId::ClassifierInput,
            config.model_input_size,
            config.model_input_size,
        )?;

        let sensor_to_portrait = Transform::rotate_about_center(pw, ph, orientation as i32);
        let sensor_to_crop = Transform::translation(-(pw as f64) / 2.0, -(ph as f64) / 2.0)
            .then(&Transform::rotation(orientation as i32))
            .then(&Transform::scale_to_fit(
                target_w,
                target_h,
                crop.width(),
                crop.height(),
                config.preserve_aspect,
            ))
            .then(&Transform::translation(
                crop.width() as f64 / 2.0,
                crop.height() as f64 / 2.0,
            ));
        let crop_to_portrait = sensor_to_crop.invert()?.then(&sensor_to_portrait);

        let mut transforms = TransformTable::new();
        transforms.insert(SpaceId::Sensor, SpaceId::Crop, sensor_to_crop)?;
        transforms.insert(SpaceId::Sensor, SpaceId::Portrait, sensor_to_portrait)?;
        transforms.insert(SpaceId::Crop, SpaceId::Portrait, crop_to_portrait)?;

        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "Session {generation}: sensor {pw}x{ph} at {orientation} deg, portrait {target_w}x{target_h}, crop {}x{}, {:?} camera",
            crop.width(),
            crop.height(),
            params.facing,
        );

        Ok(Self {
            generation,
            sensor,
            crop,
            portrait,
            classifier_input,
            sensor_orientation: orientation,
            facing: params.facing,
            transforms,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sensor_orientation(&self) -> u32 {
        self.sensor_orientation
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    pub fn space(&self, id: SpaceId) -> &CoordinateSpace {
        match id {
            SpaceId::Sensor => &self.sensor,
            SpaceId::Crop => &self.crop,
            SpaceId::Portrait => &self.portrait,
            SpaceId::ClassifierInput => &self.classifier_input,
        }
    }

    pub fn transform(&self, from: SpaceId, to: SpaceId) -> Result<&Transform, GeometryError> {
        self.transforms.get(from, to)
    }

    pub fn sensor_to_crop(&self) -> Result<&Transform, GeometryError> {
        self.transform(SpaceId::Sensor, SpaceId::Crop)
    }

    pub fn crop_to_sensor(&self) -> Result<&Transform, GeometryError> {
        self.transform(SpaceId::Crop, SpaceId::Sensor)
    }

    pub fn sensor_to_portrait(&self) -> Result<&Transform, GeometryError> {
        self.transform(SpaceId::Sensor, SpaceId::Portrait)
    }

    /// Display reflection for front-facing cameras, applied in sensor space.
    pub fn mirror_transform(&self) -> Option<Transform> {
        match self.facing {
            CameraFacing::Front => Some(Transform::mirror(
                self.sensor_orientation,
                self.sensor.width(),
                self.sensor.height(),
            )),
            CameraFacing::Back => None,
        }
    }
}

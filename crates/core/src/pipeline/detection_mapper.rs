use std::time::{Instant, SystemTime};

use super::cycle_error::CycleError;
use super::pipeline_logger::PipelineLogger;
use crate::detection::domain::face_observation::FaceObservation;
use crate::detection::domain::mask_classifier::{MaskClassifier, Recognition};
use crate::geometry::bounding_box::BoundingBox;
use crate::geometry::coordinate_space::SpaceId;
use crate::geometry::error::GeometryError;
use crate::geometry::space_registry::PipelineSession;
use crate::geometry::transform::Transform;
use crate::imaging::resampler::warp;
use crate::shared::classified_result::{ClassifiedResult, ColorCategory};
use crate::shared::config::PipelineConfig;
use crate::shared::frame::Frame;

/// Label, confidence and color for one face after thresholding.
#[derive(Clone, Debug, PartialEq)]
pub struct Verdict {
    pub label: String,
    pub confidence: Option<f32>,
    pub color: ColorCategory,
}

/// Turns the classifier's top recognition into a displayable verdict.
///
/// Below the acceptance threshold the label is blanked and the confidence
/// reported as unknown, whichever class won.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskLabelPolicy {
    threshold: f32,
    alert_label: String,
}

impl MaskLabelPolicy {
    pub fn new(threshold: f32, alert_label: impl Into<String>) -> Self {
        Self {
            threshold,
            alert_label: alert_label.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.acceptance_threshold, config.alert_label.clone())
    }

    pub fn assess(&self, top: Option<&Recognition>) -> Verdict {
        match top {
            Some(r) if r.confidence >= self.threshold => Verdict {
                label: r.label.clone(),
                confidence: Some(r.confidence),
                color: if r.label == self.alert_label {
                    ColorCategory::Alert
                } else {
                    ColorCategory::Clear
                },
            },
            _ => Verdict {
                label: String::new(),
                confidence: None,
                color: ColorCategory::Unknown,
            },
        }
    }
}

/// Per-frame context shared by every face of that frame.
pub struct FrameContext<'a> {
    pub frame_id: u64,
    pub captured_at: SystemTime,
    pub session: &'a PipelineSession,
}

/// Translate the box's top-left to the origin, then stretch it (independent
/// x/y scale) onto the `size × size` classifier input.
pub fn face_to_classifier_input(face: &BoundingBox, size: u32) -> Result<Transform, GeometryError> {
    if face.is_degenerate() {
        return Err(GeometryError::InvalidGeometry(format!(
            "face box {}x{} has no area",
            face.width(),
            face.height()
        )));
    }
    Ok(Transform::translation(-face.left, -face.top).then(&Transform::scaling(
        size as f64 / face.width(),
        size as f64 / face.height(),
    )))
}

/// Projects detector boxes through the session's transform chain, classifies
/// each face and produces display-ready results.
pub struct DetectionMapper {
    classifier: Box<dyn MaskClassifier>,
    policy: MaskLabelPolicy,
}

impl DetectionMapper {
    pub fn new(classifier: Box<dyn MaskClassifier>, policy: MaskLabelPolicy) -> Self {
        Self { classifier, policy }
    }

    /// Maps every observation of one frame.
    ///
    /// `portrait` must already hold the rotation-corrected frame; `face` is
    /// scratch space in classifier-input dimensions. Faces whose box loses
    /// its area at any step are skipped and counted. Geometry and classifier
    /// failures abort the whole frame.
    pub fn map_faces(
        &mut self,
        ctx: &FrameContext<'_>,
        observations: &[FaceObservation],
        portrait: &Frame,
        face: &mut Frame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<Vec<ClassifiedResult>, CycleError> {
        let session = ctx.session;
        let crop_to_sensor = session.crop_to_sensor()?;
        let sensor_to_portrait = session.sensor_to_portrait()?;
        let input_size = session.space(SpaceId::ClassifierInput).width();
        let mirror = session.mirror_transform();

        let mut results = Vec::with_capacity(observations.len());
        let mut degenerate = 0usize;

        for observation in observations {
            let sensor_box = crop_to_sensor.map_box(&observation.bbox);
            let portrait_box = sensor_to_portrait.map_box(&sensor_box);
            if observation.bbox.is_degenerate()
                || sensor_box.is_degenerate()
                || portrait_box.is_degenerate()
            {
                degenerate += 1;
                log::debug!(
                    "Frame {}: skipping degenerate face {}",
                    ctx.frame_id,
                    observation.id
                );
                continue;
            }

            warp(
                portrait,
                face,
                &face_to_classifier_input(&portrait_box, input_size)?,
            )?;

            let start = Instant::now();
            let recognitions = self
                .classifier
                .classify(face)
                .map_err(|e| CycleError::Classifier(e.to_string()))?;
            logger.timing("classify", start.elapsed().as_secs_f64() * 1000.0);

            let verdict = self.policy.assess(recognitions.first());

            // Mirroring is display-only: the classifier already saw the
            // unmirrored pixels.
            let location = match &mirror {
                Some(m) => m.map_box(&sensor_box),
                None => sensor_box,
            };

            results.push(ClassifiedResult {
                frame_id: ctx.frame_id,
                face_id: observation.id,
                location,
                label: verdict.label,
                confidence: verdict.confidence,
                color: verdict.color,
                captured_at: ctx.captured_at,
            });
        }

        logger.metric("degenerate_faces", degenerate as f64);
        logger.metric("classified_faces", results.len() as f64);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::space_registry::{CameraFacing, SessionParams};
    use crate::pipeline::pipeline_logger::{NullPipelineLogger, StatsPipelineLogger};
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    struct StubClassifier {
        ranked: Vec<Recognition>,
        inputs: Arc<Mutex<Vec<Frame>>>,
    }

    impl StubClassifier {
        fn new(ranked: Vec<Recognition>) -> Self {
            Self {
                ranked,
                inputs: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl MaskClassifier for StubClassifier {
        fn classify(&mut self, face: &Frame) -> Result<Vec<Recognition>, Box<dyn std::error::Error>> {
            self.inputs.lock().unwrap().push(face.clone());
            Ok(self.ranked.clone())
        }
    }

    struct FailingClassifier;

    impl MaskClassifier for FailingClassifier {
        fn classify(&mut self, _face: &Frame) -> Result<Vec<Recognition>, Box<dyn std::error::Error>> {
            Err("model crashed".into())
        }
    }

    fn session(rotation: i32, facing: CameraFacing) -> PipelineSession {
        let params = SessionParams {
            preview_width: 800,
            preview_height: 600,
            capture_rotation: rotation,
            screen_orientation: 0,
            facing,
        };
        PipelineSession::new(&params, &PipelineConfig::default()).unwrap()
    }

    fn buffers(session: &PipelineSession) -> (Frame, Frame) {
        let (pw, ph) = session.space(SpaceId::Portrait).dimensions();
        let n = session.space(SpaceId::ClassifierInput).width();
        (
            Frame::new(vec![90u8; (pw * ph * 3) as usize], pw, ph, 3),
            Frame::zeroed(n, n, 3),
        )
    }

    fn observation(id: u32, l: f64, t: f64, r: f64, b: f64) -> FaceObservation {
        FaceObservation::new(id, BoundingBox::new(l, t, r, b))
    }

    fn map(
        mapper: &mut DetectionMapper,
        session: &PipelineSession,
        observations: &[FaceObservation],
    ) -> Result<Vec<ClassifiedResult>, CycleError> {
        let (portrait, mut face) = buffers(session);
        let ctx = FrameContext {
            frame_id: 7,
            captured_at: SystemTime::UNIX_EPOCH,
            session,
        };
        mapper.map_faces(&ctx, observations, &portrait, &mut face, &mut NullPipelineLogger)
    }

    fn mapper(ranked: Vec<Recognition>) -> DetectionMapper {
        DetectionMapper::new(
            Box::new(StubClassifier::new(ranked)),
            MaskLabelPolicy::from_config(&PipelineConfig::default()),
        )
    }

    // ── Label policy ─────────────────────────────────────────────────

    #[rstest]
    #[case::exactly_at_threshold(0.6, true)]
    #[case::just_below(0.599_999, false)]
    #[case::well_above(0.95, true)]
    #[case::zero(0.0, false)]
    fn test_threshold_boundary(#[case] confidence: f32, #[case] accepted: bool) {
        let policy = MaskLabelPolicy::new(0.6, "no_mask");
        let verdict = policy.assess(Some(&Recognition::new("mask", confidence)));
        if accepted {
            assert_eq!(verdict.label, "mask");
            assert_eq!(verdict.confidence, Some(confidence));
        } else {
            assert!(verdict.label.is_empty());
            assert_eq!(verdict.confidence, None);
            assert_eq!(verdict.color, ColorCategory::Unknown);
        }
    }

    #[test]
    fn test_alert_label_maps_to_alert_color() {
        let policy = MaskLabelPolicy::new(0.6, "no_mask");
        let verdict = policy.assess(Some(&Recognition::new("no_mask", 0.8)));
        assert_eq!(verdict.color, ColorCategory::Alert);
    }

    #[test]
    fn test_other_label_maps_to_clear_color() {
        let policy = MaskLabelPolicy::new(0.6, "no_mask");
        let verdict = policy.assess(Some(&Recognition::new("mask", 0.8)));
        assert_eq!(verdict.color, ColorCategory::Clear);
    }

    #[test]
    fn test_no_recognition_is_unknown() {
        let policy = MaskLabelPolicy::new(0.6, "no_mask");
        assert_eq!(policy.assess(None).color, ColorCategory::Unknown);
    }

    // ── Per-face transform ───────────────────────────────────────────

    #[test]
    fn test_face_transform_stretches_box_onto_square() {
        let face = BoundingBox::new(20.0, 40.0, 120.0, 90.0);
        let t = face_to_classifier_input(&face, 224).unwrap();
        let mapped = t.map_box(&face);
        assert_relative_eq!(mapped.left, 0.0, epsilon = 1e-9);
        assert_relative_eq!(mapped.top, 0.0, epsilon = 1e-9);
        assert_relative_eq!(mapped.right, 224.0, epsilon = 1e-9);
        assert_relative_eq!(mapped.bottom, 224.0, epsilon = 1e-9);
    }

    #[test]
    fn test_face_transform_rejects_degenerate_box() {
        let face = BoundingBox::new(20.0, 40.0, 20.0, 90.0);
        assert!(face_to_classifier_input(&face, 224).is_err());
    }

    // ── Mapping ──────────────────────────────────────────────────────

    #[test]
    fn test_maps_crop_box_to_sensor_space() {
        let s = session(0, CameraFacing::Back);
        let mut m = mapper(vec![Recognition::new("mask", 0.9)]);

        let results = map(&mut m, &s, &[observation(3, 10.0, 10.0, 50.0, 60.0)]).unwrap();

        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.frame_id, 7);
        assert_eq!(r.face_id, 3);
        assert_relative_eq!(r.location.left, 20.0, epsilon = 1e-6);
        assert_relative_eq!(r.location.top, 20.0, epsilon = 1e-6);
        assert_relative_eq!(r.location.right, 100.0, epsilon = 1e-6);
        assert_relative_eq!(r.location.bottom, 120.0, epsilon = 1e-6);
        assert_eq!(r.label, "mask");
        assert_eq!(r.color, ColorCategory::Clear);
    }

    #[test]
    fn test_classifier_sees_input_sized_face() {
        let s = session(90, CameraFacing::Back);
        let classifier = StubClassifier::new(vec![Recognition::new("mask", 0.9)]);
        let inputs = classifier.inputs.clone();
        let mut m = DetectionMapper::new(Box::new(classifier), MaskLabelPolicy::new(0.6, "no_mask"));

        map(&mut m, &s, &[observation(0, 10.0, 10.0, 50.0, 60.0)]).unwrap();

        let inputs = inputs.lock().unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].dimensions(), (224, 224));
        // Uniform portrait: every resampled pixel keeps its value
        assert!(inputs[0].data().iter().all(|&v| v == 90));
    }

    #[test]
    fn test_front_camera_mirrors_reported_box() {
        let s = session(0, CameraFacing::Front);
        let mut m = mapper(vec![Recognition::new("mask", 0.9)]);

        // Crop (50,50)-(100,90) is sensor (100,100)-(200,180) at orientation 0
        let results = map(&mut m, &s, &[observation(0, 50.0, 50.0, 100.0, 90.0)]).unwrap();

        let loc = results[0].location;
        assert_relative_eq!(loc.left, 600.0, epsilon = 1e-6);
        assert_relative_eq!(loc.top, 100.0, epsilon = 1e-6);
        assert_relative_eq!(loc.right, 700.0, epsilon = 1e-6);
        assert_relative_eq!(loc.bottom, 180.0, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_faces_are_skipped_and_counted() {
        let s = session(90, CameraFacing::Back);
        let mut m = mapper(vec![Recognition::new("mask", 0.9)]);
        let (portrait, mut face) = buffers(&s);
        let ctx = FrameContext {
            frame_id: 1,
            captured_at: SystemTime::UNIX_EPOCH,
            session: &s,
        };
        let mut logger = StatsPipelineLogger::new(10);

        let results = m
            .map_faces(
                &ctx,
                &[
                    observation(0, 10.0, 10.0, 10.0, 60.0),
                    observation(1, 10.0, 10.0, 50.0, 60.0),
                    observation(2, 30.0, 30.0, 20.0, 40.0),
                ],
                &portrait,
                &mut face,
                &mut logger,
            )
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].face_id, 1);
        let degenerate = logger.metrics_for("degenerate_faces").unwrap();
        assert_eq!(degenerate.count, 1);
        assert!((degenerate.sum - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_low_confidence_emits_unlabeled_box() {
        let s = session(0, CameraFacing::Back);
        let mut m = mapper(vec![Recognition::new("no_mask", 0.4)]);

        let results = map(&mut m, &s, &[observation(0, 10.0, 10.0, 50.0, 60.0)]).unwrap();

        assert_eq!(results.len(), 1);
        assert!(!results[0].is_labeled());
        assert_eq!(results[0].confidence, None);
        assert_eq!(results[0].color, ColorCategory::Unknown);
    }

    #[test]
    fn test_empty_ranking_emits_unknown() {
        let s = session(0, CameraFacing::Back);
        let mut m = mapper(Vec::new());

        let results = map(&mut m, &s, &[observation(0, 10.0, 10.0, 50.0, 60.0)]).unwrap();

        assert_eq!(results[0].color, ColorCategory::Unknown);
    }

    #[test]
    fn test_only_top_recognition_is_used() {
        let s = session(0, CameraFacing::Back);
        let mut m = mapper(vec![
            Recognition::new("no_mask", 0.7),
            Recognition::new("mask", 0.3),
        ]);

        let results = map(&mut m, &s, &[observation(0, 10.0, 10.0, 50.0, 60.0)]).unwrap();

        assert_eq!(results[0].label, "no_mask");
        assert_eq!(results[0].color, ColorCategory::Alert);
    }

    #[test]
    fn test_classifier_failure_aborts_frame() {
        let s = session(0, CameraFacing::Back);
        let mut m = DetectionMapper::new(Box::new(FailingClassifier), MaskLabelPolicy::new(0.6, "no_mask"));

        let result = map(&mut m, &s, &[observation(0, 10.0, 10.0, 50.0, 60.0)]);

        assert!(matches!(result, Err(CycleError::Classifier(_))));
    }

    #[test]
    fn test_no_observations_yields_no_results() {
        let s = session(0, CameraFacing::Back);
        let mut m = mapper(vec![Recognition::new("mask", 0.9)]);
        assert!(map(&mut m, &s, &[]).unwrap().is_empty());
    }
}

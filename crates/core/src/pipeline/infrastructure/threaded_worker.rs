use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Instant, SystemTime};

use crossbeam_channel::{Receiver, Sender};

use crate::detection::domain::face_detector::FaceDetector;
use crate::geometry::coordinate_space::SpaceId;
use crate::geometry::error::GeometryError;
use crate::geometry::space_registry::PipelineSession;
use crate::imaging::resampler::warp;
use crate::imaging::scratch_pool::ScratchPool;
use crate::pipeline::cycle_error::CycleError;
use crate::pipeline::detection_mapper::{DetectionMapper, FrameContext};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::result_sink::ResultSink;
use crate::shared::classified_result::ClassifiedResult;
use crate::shared::frame::Frame;

/// One admitted frame, handed from the capture context to the worker.
pub struct FrameJob {
    pub frame_id: u64,
    pub captured_at: SystemTime,
    /// Session the frame was admitted under. A reconfiguration mid-cycle
    /// does not affect it.
    pub session: Arc<PipelineSession>,
    pub frame: Frame,
}

/// Everything the worker owns for the lifetime of the scheduler.
pub struct WorkerParts {
    pub detector: Box<dyn FaceDetector>,
    pub mapper: DetectionMapper,
    pub logger: Box<dyn PipelineLogger>,
}

/// Spawns the single worker thread.
///
/// Every job ends in exactly one [`ResultSink::publish`], also when the
/// cycle fails or panics, so the admission gate always reopens. The
/// job's frame buffer goes back through `recycle_tx` before publishing.
/// The thread exits when `job_rx` disconnects and hands back the logger.
pub fn spawn_worker(
    parts: WorkerParts,
    sink: Arc<ResultSink>,
    job_rx: Receiver<FrameJob>,
    recycle_tx: Sender<Frame>,
    channels: u8,
) -> std::io::Result<JoinHandle<Box<dyn PipelineLogger>>> {
    std::thread::Builder::new()
        .name("maskwatch-worker".into())
        .spawn(move || {
            let WorkerParts {
                mut detector,
                mut mapper,
                mut logger,
            } = parts;
            let mut pool = ScratchPool::new(channels);
            logger.info(&format!("Worker started ({channels}-channel buffers)"));

            for job in job_rx {
                let frame_id = job.frame_id;
                let generation = job.session.generation();

                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    run_cycle(
                        detector.as_mut(),
                        &mut mapper,
                        &mut pool,
                        &job,
                        logger.as_mut(),
                    )
                }));
                let results = match outcome {
                    Ok(Ok(results)) => results,
                    Ok(Err(e)) => {
                        log::warn!("Frame {frame_id}: {e}");
                        Vec::new()
                    }
                    Err(_) => {
                        log::error!("Frame {frame_id}: worker cycle panicked");
                        // Buffers may be half-written; force a resize next cycle.
                        pool = ScratchPool::new(channels);
                        Vec::new()
                    }
                };

                let published = results.len();
                let _ = recycle_tx.try_send(job.frame);
                sink.publish(frame_id, generation, results);
                logger.cycle_completed(frame_id, published);
            }

            logger.summary();
            logger
        })
}

/// Crop → detect → portrait → per-face classification for one frame.
fn run_cycle(
    detector: &mut dyn FaceDetector,
    mapper: &mut DetectionMapper,
    pool: &mut ScratchPool,
    job: &FrameJob,
    logger: &mut dyn PipelineLogger,
) -> Result<Vec<ClassifiedResult>, CycleError> {
    let session = job.session.as_ref();
    pool.prepare(session);

    let start = Instant::now();
    let crop = pool
        .buffer_mut(SpaceId::Crop)
        .ok_or_else(|| missing_buffer(SpaceId::Crop))?;
    warp(&job.frame, crop, session.sensor_to_crop()?)?;
    logger.timing("crop", elapsed_ms(start));

    let start = Instant::now();
    let crop = pool
        .buffer(SpaceId::Crop)
        .ok_or_else(|| missing_buffer(SpaceId::Crop))?;
    let observations = detector
        .detect(crop)
        .map_err(|e| CycleError::Detector(e.to_string()))?;
    logger.timing("detect", elapsed_ms(start));
    logger.metric("faces", observations.len() as f64);

    if observations.is_empty() {
        return Ok(Vec::new());
    }

    let start = Instant::now();
    let portrait = pool
        .buffer_mut(SpaceId::Portrait)
        .ok_or_else(|| missing_buffer(SpaceId::Portrait))?;
    warp(&job.frame, portrait, session.sensor_to_portrait()?)?;
    logger.timing("portrait", elapsed_ms(start));

    let (portrait, face) = pool.portrait_and_face();
    let ctx = FrameContext {
        frame_id: job.frame_id,
        captured_at: job.captured_at,
        session,
    };
    mapper.map_faces(&ctx, &observations, portrait, face, logger)
}

fn missing_buffer(id: SpaceId) -> GeometryError {
    GeometryError::InvalidGeometry(format!("no scratch buffer for {id} space"))
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, TryLockError};
use std::thread::JoinHandle;
use std::time::SystemTime;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use super::admission_gate::AdmissionGate;
use super::infrastructure::threaded_worker::{spawn_worker, FrameJob, WorkerParts};
use super::pipeline_logger::PipelineLogger;
use super::result_sink::{PublishedFrame, ResultListener, ResultSink};
use crate::geometry::coordinate_space::SpaceId;
use crate::geometry::space_registry::PipelineSession;
use crate::shared::frame::Frame;

/// A pooled camera buffer, lent to the scheduler for the duration of one
/// `on_frame_available` call.
///
/// [`release`](Self::release) hands it back to the camera's pool. The
/// scheduler calls it exactly once, before returning, whatever happens to
/// the frame.
pub trait CaptureBuffer {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn channels(&self) -> u8;

    /// Bytes between the starts of consecutive rows.
    fn row_stride(&self) -> usize {
        self.width() as usize * self.channels() as usize
    }

    fn pixels(&self) -> &[u8];

    fn release(self)
    where
        Self: Sized;
}

/// What happened to an arriving frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Copied and handed to the worker.
    Admitted { frame_id: u64 },
    /// Released untouched: a cycle was in flight, the session was being
    /// replaced, or the buffer did not match the session.
    Dropped { frame_id: u64 },
}

impl Admission {
    pub fn frame_id(&self) -> u64 {
        match *self {
            Admission::Admitted { frame_id } | Admission::Dropped { frame_id } => frame_id,
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub arrived: u64,
    pub admitted: u64,
    pub dropped: u64,
}

/// Capture-side entry point of the pipeline.
///
/// Owns the worker thread. [`on_frame_available`](Self::on_frame_available)
/// never blocks: it either claims the admission gate, copies the pixels into
/// a recycled buffer and queues the job, or drops the frame.
pub struct FrameScheduler {
    gate: Arc<AdmissionGate>,
    sink: Arc<ResultSink>,
    session: RwLock<Arc<PipelineSession>>,
    frame_counter: AtomicU64,
    admitted: AtomicU64,
    dropped: AtomicU64,
    job_tx: Option<Sender<FrameJob>>,
    recycle_rx: Receiver<Frame>,
    worker: Option<JoinHandle<Box<dyn PipelineLogger>>>,
}

impl FrameScheduler {
    /// Spawns the worker and returns a scheduler in the Idle state.
    ///
    /// `channels` sizes the worker's scratch buffers; it should match the
    /// capture format.
    pub fn start(
        session: PipelineSession,
        parts: WorkerParts,
        listener: Option<Box<dyn ResultListener>>,
        channels: u8,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let gate = Arc::new(AdmissionGate::new());
        let sink = Arc::new(ResultSink::new(gate.clone(), listener));

        // Capacity 1 suffices: the gate keeps at most one job outstanding.
        let (job_tx, job_rx) = crossbeam_channel::bounded(1);
        let (recycle_tx, recycle_rx) = crossbeam_channel::bounded(1);
        let worker = spawn_worker(parts, sink.clone(), job_rx, recycle_tx, channels)?;

        Ok(Self {
            gate,
            sink,
            session: RwLock::new(Arc::new(session)),
            frame_counter: AtomicU64::new(0),
            admitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            job_tx: Some(job_tx),
            recycle_rx,
            worker: Some(worker),
        })
    }

    /// Called from the capture callback for every new camera buffer.
    ///
    /// The buffer is released before this returns, in every outcome.
    pub fn on_frame_available<B: CaptureBuffer>(
        &self,
        buffer: B,
        captured_at: SystemTime,
    ) -> Admission {
        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed) + 1;

        if !self.gate.try_admit() {
            buffer.release();
            return self.drop_frame(frame_id, "worker busy");
        }

        let Some(session) = self.try_session() else {
            buffer.release();
            self.gate.release();
            return self.drop_frame(frame_id, "session being reconfigured");
        };
        let expected = session.space(SpaceId::Sensor).dimensions();
        if (buffer.width(), buffer.height()) != expected {
            log::warn!(
                "Frame {frame_id}: buffer {}x{} does not match session sensor {}x{}",
                buffer.width(),
                buffer.height(),
                expected.0,
                expected.1
            );
            buffer.release();
            self.gate.release();
            return self.drop_frame(frame_id, "size mismatch");
        }

        let mut frame = self.recycle_rx.try_recv().unwrap_or_default();
        let copied = frame.copy_from_strided(
            buffer.pixels(),
            buffer.width(),
            buffer.height(),
            buffer.channels(),
            buffer.row_stride(),
        );
        buffer.release();
        if !copied {
            log::warn!("Frame {frame_id}: capture buffer shorter than its geometry");
            self.gate.release();
            return self.drop_frame(frame_id, "short buffer");
        }

        let job = FrameJob {
            frame_id,
            captured_at,
            session,
            frame,
        };
        let sent = match &self.job_tx {
            Some(tx) => tx.try_send(job),
            None => Err(TrySendError::Disconnected(job)),
        };
        if let Err(e) = sent {
            log::error!("Frame {frame_id}: worker unavailable ({e})");
            self.gate.release();
            return self.drop_frame(frame_id, "worker unavailable");
        }

        self.admitted.fetch_add(1, Ordering::Relaxed);
        log::debug!("Frame {frame_id}: admitted");
        Admission::Admitted { frame_id }
    }

    fn drop_frame(&self, frame_id: u64, reason: &str) -> Admission {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        log::debug!("Frame {frame_id}: dropped ({reason})");
        Admission::Dropped { frame_id }
    }

    /// Installs a rebuilt session for frames admitted from now on. A cycle
    /// already in flight finishes against its own session.
    pub fn reconfigure(&self, session: PipelineSession) {
        let generation = session.generation();
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(session);
        log::info!("Scheduler switched to session {generation}");
    }

    /// The current session, or `None` while `reconfigure` holds the lock.
    fn try_session(&self) -> Option<Arc<PipelineSession>> {
        match self.session.try_read() {
            Ok(guard) => Some(guard.clone()),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner().clone()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub fn session(&self) -> Arc<PipelineSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            arrived: self.frame_counter.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn sink(&self) -> &Arc<ResultSink> {
        &self.sink
    }

    pub fn latest(&self) -> Arc<PublishedFrame> {
        self.sink.latest()
    }

    /// Stops accepting work, waits for the in-flight cycle to publish and
    /// returns the worker's logger.
    pub fn shutdown(mut self) -> Result<Box<dyn PipelineLogger>, Box<dyn std::error::Error>> {
        self.job_tx.take();
        match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| "worker thread panicked outside a cycle".into()),
            None => Err("worker already stopped".into()),
        }
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.job_tx.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("Worker thread panicked during shutdown");
            }
        }
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use super::admission_gate::AdmissionGate;
use crate::shared::classified_result::ClassifiedResult;

/// The complete result set of one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PublishedFrame {
    pub frame_id: u64,
    /// Generation of the session the frame was admitted under; compare with
    /// the current session to spot stale geometry.
    pub session_generation: u64,
    pub results: Vec<ClassifiedResult>,
}

/// Renderer/tracker side of the boundary.
///
/// Called on the worker context; implementations must not block.
pub trait ResultListener: Send + Sync {
    fn on_results_published(&self, frame: &PublishedFrame);
}

/// Holds the most recently published result set and ends worker cycles.
///
/// Publishing swaps a whole `Arc<PublishedFrame>` under a short write lock,
/// so readers see either the previous set or the new one, never a mix.
pub struct ResultSink {
    latest: RwLock<Arc<PublishedFrame>>,
    listener: Option<Box<dyn ResultListener>>,
    gate: Arc<AdmissionGate>,
    publications: AtomicU64,
}

impl ResultSink {
    pub fn new(gate: Arc<AdmissionGate>, listener: Option<Box<dyn ResultListener>>) -> Self {
        Self {
            latest: RwLock::new(Arc::new(PublishedFrame::default())),
            listener,
            gate,
            publications: AtomicU64::new(0),
        }
    }

    /// Replaces the published set, reopens the admission gate, then notifies
    /// the listener. A listener that sees frame N can rely on the gate being
    /// open for frame N + 1.
    pub fn publish(&self, frame_id: u64, session_generation: u64, results: Vec<ClassifiedResult>) {
        let frame = Arc::new(PublishedFrame {
            frame_id,
            session_generation,
            results,
        });

        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = frame.clone();
        self.publications.fetch_add(1, Ordering::Relaxed);
        self.gate.release();

        log::debug!(
            "Published frame {frame_id}: {} results",
            frame.results.len()
        );
        if let Some(listener) = &self.listener {
            listener.on_results_published(&frame);
        }
    }

    /// Snapshot of the most recent publication.
    pub fn latest(&self) -> Arc<PublishedFrame> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn publications(&self) -> u64 {
        self.publications.load(Ordering::Relaxed)
    }
}

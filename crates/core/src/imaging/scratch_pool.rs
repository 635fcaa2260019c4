use crate::geometry::coordinate_space::SpaceId;
use crate::geometry::space_registry::PipelineSession;
use crate::shared::frame::Frame;

/// Reusable working bitmaps, one per derived coordinate space.
///
/// Owned exclusively by the worker for the duration of a cycle. Buffers are
/// resized only when a session with a different generation is prepared, so
/// steady-state cycles do not allocate.
pub struct ScratchPool {
    channels: u8,
    generation: Option<u64>,
    crop: Frame,
    portrait: Frame,
    face: Frame,
    reshapes: usize,
}

impl ScratchPool {
    pub fn new(channels: u8) -> Self {
        Self {
            channels,
            generation: None,
            crop: Frame::default(),
            portrait: Frame::default(),
            face: Frame::default(),
            reshapes: 0,
        }
    }

    /// Sizes every buffer for `session`. No-op when already prepared for it.
    pub fn prepare(&mut self, session: &PipelineSession) {
        if self.generation == Some(session.generation()) {
            return;
        }
        for id in [SpaceId::Crop, SpaceId::Portrait, SpaceId::ClassifierInput] {
            let (w, h) = session.space(id).dimensions();
            let channels = self.channels;
            if let Some(buffer) = self.buffer_mut(id) {
                buffer.reshape(w, h, channels);
            }
        }
        self.generation = Some(session.generation());
        self.reshapes += 1;
        log::debug!("Scratch buffers sized for session {}", session.generation());
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Sensor frames are owned by the job, not the pool.
    pub fn buffer(&self, id: SpaceId) -> Option<&Frame> {
        match id {
            SpaceId::Sensor => None,
            SpaceId::Crop => Some(&self.crop),
            SpaceId::Portrait => Some(&self.portrait),
            SpaceId::ClassifierInput => Some(&self.face),
        }
    }

    pub fn buffer_mut(&mut self, id: SpaceId) -> Option<&mut Frame> {
        match id {
            SpaceId::Sensor => None,
            SpaceId::Crop => Some(&mut self.crop),
            SpaceId::Portrait => Some(&mut self.portrait),
            SpaceId::ClassifierInput => Some(&mut self.face),
        }
    }

    /// Portrait (read) and classifier-input (write) buffers, borrowed together
    /// for per-face extraction.
    pub fn portrait_and_face(&mut self) -> (&Frame, &mut Frame) {
        (&self.portrait, &mut self.face)
    }

    /// Number of times the pool has been resized for a new session.
    pub fn reshapes(&self) -> usize {
        self.reshapes
    }
}

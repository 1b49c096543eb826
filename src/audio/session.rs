//! The audio side of one call as a single owned resource.
//!
//! An [`AudioSession`] bundles the capture frame stream, the playback output,
//! the scheduler and the device handle. Dropping it stops every live chunk and
//! releases the devices, whichever way the call ended.

use std::sync::Arc;
use tokio::sync::mpsc;

use super::pcm;
use super::{AudioDevices, ChunkId, PlaybackOutput, PlaybackScheduler, ScheduledChunk};

pub struct AudioSession {
    pub(crate) frames: mpsc::UnboundedReceiver<Vec<f32>>,
    pub(crate) ended: mpsc::UnboundedReceiver<ChunkId>,
    output: Arc<dyn PlaybackOutput>,
    scheduler: PlaybackScheduler,
    playback_sample_rate: u32,
    devices: Option<Box<dyn AudioDevices>>,
}

impl AudioSession {
    /// Assemble a session from already-opened parts.
    ///
    /// `frames` yields captured mono frames; `ended` yields ids of chunks the
    /// output finished playing.
    pub fn new(
        frames: mpsc::UnboundedReceiver<Vec<f32>>,
        ended: mpsc::UnboundedReceiver<ChunkId>,
        output: Arc<dyn PlaybackOutput>,
        playback_sample_rate: u32,
        devices: Box<dyn AudioDevices>,
    ) -> Self {
        Self {
            frames,
            ended,
            output,
            scheduler: PlaybackScheduler::new(),
            playback_sample_rate,
            devices: Some(devices),
        }
    }

    /// Queue decoded samples right after whatever is already scheduled.
    pub fn schedule(&mut self, samples: Vec<f32>) -> ScheduledChunk {
        let duration = pcm::duration_of(samples.len(), self.playback_sample_rate);
        let chunk = self.scheduler.schedule(self.output.now(), duration);
        self.output.start(chunk.id, samples, chunk.start_at);
        chunk
    }

    /// Record a completion notice. Returns `true` when nothing is left playing.
    pub fn on_ended(&mut self, id: ChunkId) -> bool {
        self.scheduler.finish(id)
    }

    /// Force-stop every scheduled or playing chunk.
    pub fn stop_playback(&mut self) -> usize {
        let ids = self.scheduler.drain();
        for id in &ids {
            self.output.stop(*id);
        }
        ids.len()
    }

    pub fn is_playing(&self) -> bool {
        !self.scheduler.is_idle()
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    /// Nudge suspended device streams back to running.
    pub fn resume(&self) {
        if let Some(devices) = &self.devices {
            devices.resume();
        }
    }

    /// Stop playback and release the devices now.
    pub fn release(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let stopped = self.stop_playback();
        if let Some(devices) = self.devices.take() {
            tracing::debug!(stopped_chunks = stopped, "Releasing audio devices");
            drop(devices);
        }
        self.frames.close();
        self.ended.close();
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

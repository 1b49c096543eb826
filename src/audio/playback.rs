//! Sample-clocked playback queue fed to the output device callback.
//!
//! The clock is the number of samples rendered so far, so chunk start times
//! computed by the scheduler line up exactly with what the device plays.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{ChunkId, PlaybackClock, PlaybackOutput};

#[derive(Debug)]
struct QueuedChunk {
    id: ChunkId,
    start: u64,
    samples: Vec<f32>,
}

impl QueuedChunk {
    fn end(&self) -> u64 {
        self.start + self.samples.len() as u64
    }
}

#[derive(Debug, Default)]
struct QueueState {
    rendered: u64,
    // Sorted by `start`.
    chunks: Vec<QueuedChunk>,
}

/// Mono playback queue driven by [`QueuedPlayback::render`].
#[derive(Debug)]
pub struct QueuedPlayback {
    sample_rate: u32,
    state: Mutex<QueueState>,
    ended_tx: mpsc::UnboundedSender<ChunkId>,
}

impl QueuedPlayback {
    /// `ended_tx` receives the id of every chunk that plays to the end.
    pub fn new(sample_rate: u32, ended_tx: mpsc::UnboundedSender<ChunkId>) -> Self {
        Self {
            sample_rate,
            state: Mutex::new(QueueState::default()),
            ended_tx,
        }
    }

    fn to_sample_index(&self, at: Duration) -> u64 {
        (at.as_secs_f64() * f64::from(self.sample_rate)).round() as u64
    }

    /// Fill `out` with the next samples and advance the clock. Gaps are silence.
    pub fn render(&self, out: &mut [f32]) {
        let mut finished = Vec::new();
        {
            let mut state = self.state.lock();
            let base = state.rendered;

            for (offset, slot) in out.iter_mut().enumerate() {
                let pos = base + offset as u64;
                *slot = state
                    .chunks
                    .iter()
                    .take_while(|c| c.start <= pos)
                    .find(|c| pos < c.end())
                    .map(|c| c.samples[(pos - c.start) as usize])
                    .unwrap_or(0.0);
            }

            state.rendered = base + out.len() as u64;
            let rendered = state.rendered;
            state.chunks.retain(|c| {
                if c.end() <= rendered {
                    finished.push(c.id);
                    false
                } else {
                    true
                }
            });
        }

        for id in finished {
            // Receiver gone means the call is over.
            let _ = self.ended_tx.send(id);
        }
    }

    /// Chunks queued or playing.
    pub fn pending(&self) -> usize {
        self.state.lock().chunks.len()
    }
}

impl PlaybackClock for QueuedPlayback {
    fn now(&self) -> Duration {
        let rendered = self.state.lock().rendered;
        super::pcm::duration_of(rendered as usize, self.sample_rate)
    }
}

impl PlaybackOutput for QueuedPlayback {
    fn start(&self, id: ChunkId, samples: Vec<f32>, at: Duration) {
        let start = self.to_sample_index(at);
        let mut state = self.state.lock();
        let start = start.max(state.rendered);
        if samples.is_empty() {
            drop(state);
            let _ = self.ended_tx.send(id);
            return;
        }
        let idx = state.chunks.partition_point(|c| c.start <= start);
        state.chunks.insert(idx, QueuedChunk { id, start, samples });
    }

    fn stop(&self, id: ChunkId) {
        self.state.lock().chunks.retain(|c| c.id != id);
    }
}

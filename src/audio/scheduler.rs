//! Gapless playback timeline.
//!
//! Every chunk starts at `max(cursor, now)` and pushes the cursor forward by
//! its own duration, so chunks play back-to-back in arrival order and never
//! overlap. The live set tracks chunks that were scheduled but have not
//! reported completion yet.

use std::collections::BTreeMap;
use std::time::Duration;

/// Identifier of one scheduled chunk, unique within a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId(pub u64);

/// Placement of one chunk on the playback clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledChunk {
    pub id: ChunkId,
    pub start_at: Duration,
    pub duration: Duration,
}

impl ScheduledChunk {
    pub fn end_at(&self) -> Duration {
        self.start_at + self.duration
    }
}

#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    cursor: Duration,
    live: BTreeMap<ChunkId, ScheduledChunk>,
    next_id: u64,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a chunk of `duration` arriving when the playback clock reads `now`.
    pub fn schedule(&mut self, now: Duration, duration: Duration) -> ScheduledChunk {
        let start_at = self.cursor.max(now);
        self.cursor = start_at + duration;

        let id = ChunkId(self.next_id);
        self.next_id += 1;

        let chunk = ScheduledChunk {
            id,
            start_at,
            duration,
        };
        self.live.insert(id, chunk);
        chunk
    }

    /// Mark a chunk as finished. Returns `true` when this emptied the live set.
    ///
    /// Unknown ids (already finished or drained) are ignored and return `false`.
    pub fn finish(&mut self, id: ChunkId) -> bool {
        self.live.remove(&id).is_some() && self.live.is_empty()
    }

    /// Clear the live set and hand back every id that still needs stopping.
    ///
    /// The cursor is left where it is; it never moves backwards.
    pub fn drain(&mut self) -> Vec<ChunkId> {
        std::mem::take(&mut self.live).into_keys().collect()
    }

    pub fn cursor(&self) -> Duration {
        self.cursor
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_idle(&self) -> bool {
        self.live.is_empty()
    }

    pub fn is_live(&self, id: ChunkId) -> bool {
        self.live.contains_key(&id)
    }
}

//! Audio I/O for a call.
//!
//! Capture runs at 16 kHz and playback at 24 kHz on two independent streams;
//! nothing is resampled. Device access sits behind [`AudioBackend`] so the
//! session controller can be driven by a fake in tests.

pub mod device;
pub mod pcm;
pub mod playback;
pub mod scheduler;
pub mod session;

use std::time::Duration;

use crate::error::ConsultError;

pub use device::CpalBackend;
pub use playback::QueuedPlayback;
pub use scheduler::{ChunkId, PlaybackScheduler, ScheduledChunk};
pub use session::AudioSession;

/// Microphone sample rate expected by the live endpoint.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of synthesized speech from the live endpoint.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Samples per outbound frame.
pub const CAPTURE_FRAME_SAMPLES: usize = 4096;

/// Fixed microphone constraints for a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_samples: usize,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            sample_rate: CAPTURE_SAMPLE_RATE,
            channels: 1,
            frame_samples: CAPTURE_FRAME_SAMPLES,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

impl CaptureConstraints {
    pub fn from_config(audio: &crate::config::AudioConfig) -> Self {
        Self {
            frame_samples: audio.capture_frame_samples,
            echo_cancellation: audio.echo_cancellation,
            noise_suppression: audio.noise_suppression,
            auto_gain_control: audio.auto_gain_control,
            ..Self::default()
        }
    }
}

/// What a call needs from the audio devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSpec {
    pub capture: CaptureConstraints,
    pub playback_sample_rate: u32,
}

impl Default for AudioSpec {
    fn default() -> Self {
        Self {
            capture: CaptureConstraints::default(),
            playback_sample_rate: PLAYBACK_SAMPLE_RATE,
        }
    }
}

/// Monotonic clock of the playback device.
pub trait PlaybackClock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Something that can play scheduled sample buffers.
///
/// Completion is reported out of band (see [`AudioSession`]); `stop` on a
/// chunk that already finished must be a silent no-op.
pub trait PlaybackOutput: PlaybackClock {
    fn start(&self, id: ChunkId, samples: Vec<f32>, at: Duration);
    fn stop(&self, id: ChunkId);
}

/// Handle keeping the underlying devices open. Dropping it releases them.
pub trait AudioDevices: Send {
    /// Resume streams the platform may have suspended.
    fn resume(&self);
}

/// Acquires microphone and speaker for one call.
pub trait AudioBackend: Send + Sync {
    /// Blocks while the platform grants device access.
    fn acquire(&self, spec: &AudioSpec) -> Result<AudioSession, ConsultError>;
}

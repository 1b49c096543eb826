use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::VoiceEvent;
use crate::error::ConsultError;

/// Everything needed to open a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSessionConfig {
    /// Model id without the `models/` prefix.
    pub model: String,
    /// Prebuilt voice for synthesized speech.
    pub voice: String,
    /// Persona and script, already interpolated for this caller.
    pub system_instruction: String,
    /// Correlates log lines for one call.
    pub session_id: String,
}

/// Outbound half of an open live session.
#[async_trait]
pub trait LiveConnection: Send + Sync {
    /// Push one PCM16LE 16 kHz frame.
    async fn send_audio(&self, pcm: &[u8]) -> anyhow::Result<()>;

    /// Close the session. Safe to call more than once.
    async fn close(&self);
}

/// An open session: the connection plus the stream of inbound events.
///
/// The event receiver closing means the vendor side ended the session.
pub struct LiveSessionHandle {
    pub connection: Arc<dyn LiveConnection>,
    pub events: mpsc::Receiver<VoiceEvent>,
}

/// Vendor that can host a live duplex voice session.
#[async_trait]
pub trait LiveVendor: Send + Sync {
    async fn open_session(
        &self,
        config: &LiveSessionConfig,
    ) -> Result<LiveSessionHandle, ConsultError>;
}

/// Vendor that answers a single text prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> anyhow::Result<String>;
}

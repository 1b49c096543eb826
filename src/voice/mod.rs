//! Live voice consultation against Gemini.
//!
//! ## Design
//! - Vendor access behind two small traits (`LiveVendor`, `TextGenerator`)
//! - Gemini Live WebSocket client for the duplex call
//! - Gemini `generateContent` client for one-shot proposal text
//! - `SessionController` owning a single call: audio, session, transcript

pub mod controller;
pub mod gemini_live;
pub mod gemini_text;
pub mod persona;
pub mod provider;

// ── Shared voice event type ──────────────────────────────────────

/// Vendor-agnostic event produced by a live session.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    /// Session setup completed; ready to stream.
    SetupComplete,
    /// Synthesized speech chunk (PCM16LE, 24kHz mono).
    Audio { data: Vec<u8> },
    /// Transcription of the caller's speech.
    InputTranscript { text: String },
    /// Transcription of the assistant's speech.
    OutputTranscript { text: String },
    /// Model finished a response turn.
    TurnComplete,
    /// The model was interrupted (caller started speaking mid-response).
    Interrupted,
    /// Error reported by the vendor or the transport.
    Error { message: String },
}

pub use controller::{ActiveCall, CallOutcome, CallSettings, CallStatus, EndReason, SessionController};
pub use gemini_live::{GeminiLiveSession, GeminiLiveVendor};
pub use gemini_text::GeminiTextClient;
pub use provider::{LiveConnection, LiveSessionConfig, LiveSessionHandle, LiveVendor, TextGenerator};

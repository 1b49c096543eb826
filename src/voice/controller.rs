//! Session controller: owns one live consultation call.
//!
//! `start_call` acquires the audio devices, opens the vendor session and
//! spawns a task that pumps microphone frames out, schedules synthesized
//! speech, records the transcript and watches for the termination sentinel.
//! `ActiveCall::end` stops that task and hands back the transcript.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::persona::{build_system_instruction, TERMINATION_SENTINEL};
use super::provider::{LiveConnection, LiveSessionConfig, LiveVendor};
use super::VoiceEvent;
use crate::audio::{pcm, AudioBackend, AudioSession, AudioSpec, CaptureConstraints};
use crate::config::{BrandingConfig, Config};
use crate::error::ConsultError;
use crate::intake::ContactRecord;
use crate::transcript::{Role, Transcript};

// ── Status ────────────────────────────────────────────────────────

pub const STATUS_IDLE: &str = "Ready";
pub const STATUS_INITIALIZING: &str = "Initializing Audio...";
pub const STATUS_CONNECTING: &str = "Connecting...";
pub const STATUS_LISTENING: &str = "Connected. Listening...";
pub const STATUS_DISCONNECTED: &str = "Disconnected";
pub const STATUS_CONNECTION_ERROR: &str = "Connection Error - Please Refresh";
pub const STATUS_ENDED: &str = "Call ended";
pub const STATUS_TERMINATED: &str = "Session terminated";

/// Snapshot published to the presentation layer while a call runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStatus {
    pub connection: String,
    pub active: bool,
    pub assistant_speaking: bool,
    pub frames_sent: u64,
    /// Frames that failed to send. Non-zero means degraded outbound audio.
    pub frames_dropped: u64,
}

impl Default for CallStatus {
    fn default() -> Self {
        Self {
            connection: STATUS_IDLE.into(),
            active: false,
            assistant_speaking: false,
            frames_sent: 0,
            frames_dropped: 0,
        }
    }
}

/// Why a call stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The user asked for the proposal (or dropped the call handle).
    UserEnded,
    /// The assistant emitted the termination sentinel.
    Terminated,
    /// The vendor closed the session.
    Disconnected,
    /// The vendor or the socket reported an error.
    TransportError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub reason: EndReason,
    pub frames_sent: u64,
    pub frames_dropped: u64,
}

// ── Settings ──────────────────────────────────────────────────────

/// Per-call parameters, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct CallSettings {
    pub model: String,
    pub voice: String,
    pub audio: AudioSpec,
    pub liveness_interval: Duration,
    pub branding: BrandingConfig,
}

impl CallSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.vendor.live_model.clone(),
            voice: config.vendor.voice.clone(),
            audio: AudioSpec {
                capture: CaptureConstraints::from_config(&config.audio),
                ..AudioSpec::default()
            },
            liveness_interval: config.liveness_interval(),
            branding: config.branding.clone(),
        }
    }
}

// ── Controller ────────────────────────────────────────────────────

pub struct SessionController {
    vendor: Arc<dyn LiveVendor>,
    audio: Arc<dyn AudioBackend>,
    settings: CallSettings,
    status: Arc<watch::Sender<CallStatus>>,
}

impl SessionController {
    pub fn new(
        vendor: Arc<dyn LiveVendor>,
        audio: Arc<dyn AudioBackend>,
        settings: CallSettings,
    ) -> Self {
        let (status, _) = watch::channel(CallStatus::default());
        Self {
            vendor,
            audio,
            settings,
            status: Arc::new(status),
        }
    }

    /// Status updates for this and every later call.
    pub fn subscribe(&self) -> watch::Receiver<CallStatus> {
        self.status.subscribe()
    }

    fn publish(&self, connection: &str) {
        self.status.send_replace(CallStatus {
            connection: connection.into(),
            ..CallStatus::default()
        });
    }

    /// Acquire audio, open the vendor session and start streaming.
    ///
    /// Returns once the session is live; the call itself runs in the
    /// background until [`ActiveCall::end`] or the session ends on its own.
    pub async fn start_call(&self, contact: &ContactRecord) -> Result<ActiveCall, ConsultError> {
        let session_id = uuid::Uuid::new_v4().to_string();

        self.publish(STATUS_INITIALIZING);
        let backend = Arc::clone(&self.audio);
        let spec = self.settings.audio.clone();
        let acquired = tokio::task::spawn_blocking(move || backend.acquire(&spec))
            .await
            .map_err(|e| ConsultError::Device(format!("audio setup task failed: {e}")))
            .and_then(|r| r);
        let audio = match acquired {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Audio acquisition failed");
                self.publish(STATUS_IDLE);
                return Err(e);
            }
        };

        self.publish(STATUS_CONNECTING);
        let config = LiveSessionConfig {
            model: self.settings.model.clone(),
            voice: self.settings.voice.clone(),
            system_instruction: build_system_instruction(&self.settings.branding, contact),
            session_id: session_id.clone(),
        };
        let handle = match self.vendor.open_session(&config).await {
            Ok(handle) => handle,
            Err(e) => {
                drop(audio);
                tracing::warn!(session_id = %session_id, error = %e, "Live session failed to open");
                self.publish(STATUS_CONNECTION_ERROR);
                return Err(e);
            }
        };

        self.status.send_replace(CallStatus {
            connection: STATUS_LISTENING.into(),
            active: true,
            ..CallStatus::default()
        });
        tracing::info!(
            session_id = %session_id,
            company = %contact.company(),
            interest = %contact.interest(),
            "Call started"
        );

        let transcript = Arc::new(Mutex::new(Transcript::new()));
        let (stop_tx, stop_rx) = oneshot::channel();
        let call = CallLoop {
            session_id: session_id.clone(),
            connection: handle.connection,
            transcript: Arc::clone(&transcript),
            status: Arc::clone(&self.status),
            liveness_interval: self.settings.liveness_interval,
        };
        let task = tokio::spawn(call.run(audio, handle.events, stop_rx));

        Ok(ActiveCall {
            session_id,
            transcript,
            stop_tx: Some(stop_tx),
            task: Some(task),
            outcome: None,
        })
    }
}

// ── Active call ───────────────────────────────────────────────────

/// Handle to a running call. Dropping it ends the call.
pub struct ActiveCall {
    session_id: String,
    transcript: Arc<Mutex<Transcript>>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<CallOutcome>>,
    outcome: Option<CallOutcome>,
}

impl ActiveCall {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Copy of the transcript so far.
    pub fn transcript(&self) -> Transcript {
        self.transcript.lock().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the call to end on its own. Cancel-safe.
    pub async fn wait(&mut self) -> CallOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        let outcome = match self.task.as_mut() {
            Some(task) => task.await.unwrap_or_else(|e| CallOutcome {
                reason: EndReason::TransportError(format!("call task failed: {e}")),
                frames_sent: 0,
                frames_dropped: 0,
            }),
            None => CallOutcome {
                reason: EndReason::UserEnded,
                frames_sent: 0,
                frames_dropped: 0,
            },
        };
        self.task = None;
        self.outcome = Some(outcome.clone());
        outcome
    }

    /// End the call and return what was said.
    ///
    /// If the call already ended on its own, its first outcome is kept.
    pub async fn end(mut self) -> (CallOutcome, Transcript) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        let outcome = self.wait().await;
        (outcome, self.transcript())
    }
}

// ── Call loop ─────────────────────────────────────────────────────

struct CallLoop {
    session_id: String,
    connection: Arc<dyn LiveConnection>,
    transcript: Arc<Mutex<Transcript>>,
    status: Arc<watch::Sender<CallStatus>>,
    liveness_interval: Duration,
}

impl CallLoop {
    fn set_speaking(&self, speaking: bool) {
        self.status.send_if_modified(|s| {
            let changed = s.assistant_speaking != speaking;
            s.assistant_speaking = speaking;
            changed
        });
    }

    async fn run(
        self,
        mut audio: AudioSession,
        mut events: mpsc::Receiver<VoiceEvent>,
        mut stop_rx: oneshot::Receiver<()>,
    ) -> CallOutcome {
        let mut liveness = tokio::time::interval(self.liveness_interval);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
        liveness.reset();

        let mut capture_open = true;
        let mut assistant_turn = String::new();
        let mut frames_sent: u64 = 0;
        let mut frames_dropped: u64 = 0;

        let reason = loop {
            tokio::select! {
                biased;

                _ = &mut stop_rx => break EndReason::UserEnded,

                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!(session_id = %self.session_id, "Live session closed by vendor");
                        break EndReason::Disconnected;
                    };
                    match event {
                        VoiceEvent::Audio { data } => {
                            let samples = pcm::decode_pcm16(&data);
                            if !samples.is_empty() {
                                audio.schedule(samples);
                                self.set_speaking(true);
                            }
                        }
                        VoiceEvent::InputTranscript { text } => {
                            self.transcript.lock().push(Role::User, text);
                        }
                        VoiceEvent::OutputTranscript { text } => {
                            assistant_turn.push_str(&text);
                            self.transcript.lock().push(Role::Assistant, text);
                            if assistant_turn.contains(TERMINATION_SENTINEL) {
                                tracing::warn!(session_id = %self.session_id, "Termination sentinel received, ending call");
                                break EndReason::Terminated;
                            }
                        }
                        VoiceEvent::TurnComplete => {
                            assistant_turn.clear();
                            self.set_speaking(false);
                        }
                        VoiceEvent::Interrupted => {
                            let stopped = audio.stop_playback();
                            tracing::debug!(session_id = %self.session_id, stopped, "Assistant interrupted");
                            assistant_turn.clear();
                            self.set_speaking(false);
                        }
                        VoiceEvent::SetupComplete => {}
                        VoiceEvent::Error { message } => {
                            tracing::error!(session_id = %self.session_id, error = %message, "Live session error");
                            break EndReason::TransportError(message);
                        }
                    }
                }

                frame = audio.frames.recv(), if capture_open => match frame {
                    Some(samples) => {
                        match self.connection.send_audio(&pcm::encode_pcm16(&samples)).await {
                            Ok(()) => frames_sent += 1,
                            Err(e) => {
                                frames_dropped += 1;
                                tracing::warn!(
                                    session_id = %self.session_id,
                                    error = %e,
                                    dropped = frames_dropped,
                                    "Audio frame not sent"
                                );
                            }
                        }
                        self.status.send_modify(|s| {
                            s.frames_sent = frames_sent;
                            s.frames_dropped = frames_dropped;
                        });
                    }
                    None => {
                        tracing::warn!(session_id = %self.session_id, "Capture stream ended");
                        capture_open = false;
                    }
                },

                Some(id) = audio.ended.recv() => {
                    if audio.on_ended(id) {
                        self.set_speaking(false);
                    }
                }

                _ = liveness.tick() => audio.resume(),
            }
        };

        // Audio first so nothing more is captured, then the session.
        audio.release();
        self.connection.close().await;

        let connection = match &reason {
            EndReason::UserEnded => STATUS_ENDED,
            EndReason::Terminated => STATUS_TERMINATED,
            EndReason::Disconnected => STATUS_DISCONNECTED,
            EndReason::TransportError(_) => STATUS_CONNECTION_ERROR,
        };
        self.status.send_modify(|s| {
            s.connection = connection.into();
            s.active = false;
            s.assistant_speaking = false;
        });

        tracing::info!(
            session_id = %self.session_id,
            reason = ?reason,
            frames_sent,
            frames_dropped,
            utterances = self.transcript.lock().len(),
            "Call ended"
        );

        CallOutcome {
            reason,
            frames_sent,
            frames_dropped,
        }
    }
}

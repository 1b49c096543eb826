//! Gemini Live WebSocket client for the consultation call.
//!
//! Implements the bidirectional streaming protocol for Google's Gemini
//! Live API (BidiGenerateContent).
//!
//! ## Protocol Overview
//!
//! 1. **Connect**: open WebSocket to the Gemini Live endpoint
//! 2. **Setup**: send model, voice, persona and transcription settings
//! 3. **Stream**: send microphone frames as `realtimeInput`, receive
//!    synthesized audio and transcripts as `serverContent`
//! 4. **Close**: gracefully close the WebSocket session
//!
//! Gemini Live delivers JSON control messages inside Binary frames as well as
//! Text frames; both are parsed the same way.

use async_trait::async_trait;
use base64::Engine;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::provider::{LiveConnection, LiveSessionConfig, LiveSessionHandle, LiveVendor};
use super::VoiceEvent;
use crate::error::ConsultError;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

// ── Constants ──────────────────────────────────────────────────────

/// Audio MIME type for microphone input (16kHz PCM mono).
const INPUT_AUDIO_MIME: &str = "audio/pcm;rate=16000";

/// Capacity of the inbound and outbound queues.
const CHANNEL_CAPACITY: usize = 256;

// ── Setup message (JSON sent as first frame) ───────────────────────

/// Top-level setup message for Gemini Live session initialization.
#[derive(Debug, Serialize)]
pub struct SetupMessage {
    pub setup: SetupPayload,
}

#[derive(Debug, Serialize)]
pub struct SetupPayload {
    pub model: String,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
    #[serde(rename = "systemInstruction")]
    pub system_instruction: SystemInstruction,
    /// Presence enables transcripts of the caller's speech.
    #[serde(rename = "inputAudioTranscription")]
    pub input_audio_transcription: TranscriptionConfig,
    /// Presence enables transcripts of the model's speech.
    #[serde(rename = "outputAudioTranscription")]
    pub output_audio_transcription: TranscriptionConfig,
}

#[derive(Debug, Serialize)]
pub struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    pub response_modalities: Vec<String>,
    #[serde(rename = "speechConfig")]
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
pub struct SpeechConfig {
    #[serde(rename = "voiceConfig")]
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
pub struct VoiceConfig {
    #[serde(rename = "prebuiltVoiceConfig")]
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
pub struct PrebuiltVoiceConfig {
    #[serde(rename = "voiceName")]
    pub voice_name: String,
}

#[derive(Debug, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
pub struct TextPart {
    pub text: String,
}

/// Empty object on the wire.
#[derive(Debug, Default, Serialize)]
pub struct TranscriptionConfig {}

/// Build the setup message for a consultation session.
pub fn build_setup_message(config: &LiveSessionConfig) -> SetupMessage {
    let model = if config.model.starts_with("models/") {
        config.model.clone()
    } else {
        format!("models/{}", config.model)
    };

    SetupMessage {
        setup: SetupPayload {
            model,
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: config.voice.clone(),
                        },
                    },
                },
            },
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: config.system_instruction.clone(),
                }],
            },
            input_audio_transcription: TranscriptionConfig::default(),
            output_audio_transcription: TranscriptionConfig::default(),
        },
    }
}

// ── Audio input message ────────────────────────────────────────────

/// Audio input message sent to Gemini Live.
#[derive(Debug, Serialize)]
pub struct RealtimeInputMessage {
    #[serde(rename = "realtimeInput")]
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Serialize)]
pub struct RealtimeInput {
    #[serde(rename = "mediaChunks")]
    pub media_chunks: Vec<MediaChunk>,
}

/// Audio chunk with MIME type and base64-encoded data.
#[derive(Debug, Serialize)]
pub struct MediaChunk {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String, // base64-encoded audio
}

/// Build a realtime audio input message from raw PCM bytes.
///
/// Wire format: `{"realtimeInput": {"mediaChunks": [{"mimeType": "audio/pcm;rate=16000", "data": "<base64>"}]}}`
pub fn build_audio_message(pcm_data: &[u8]) -> RealtimeInputMessage {
    let b64 = base64::engine::general_purpose::STANDARD.encode(pcm_data);
    RealtimeInputMessage {
        realtime_input: RealtimeInput {
            media_chunks: vec![MediaChunk {
                mime_type: INPUT_AUDIO_MIME.to_string(),
                data: b64,
            }],
        },
    }
}

// ── Server response parsing ────────────────────────────────────────

fn transcription_text(value: Option<&serde_json::Value>) -> Option<String> {
    value
        .and_then(|t| t.get("text"))
        .and_then(|v| v.as_str())
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Parse a JSON frame from Gemini Live into a list of events.
///
/// A single server message can carry several events (e.g. audio
/// and a transcription fragment in the same frame). Transcriptions are
/// accepted both inside `serverContent` and at the top level. A frame that
/// is not valid JSON yields nothing; only a vendor `error` object becomes
/// [`VoiceEvent::Error`].
pub fn parse_server_message(json_text: &str) -> Vec<VoiceEvent> {
    let mut events = Vec::new();

    let value: serde_json::Value = match serde_json::from_str(json_text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, len = json_text.len(), "Skipping malformed Gemini Live frame");
            return events;
        }
    };

    if value.get("setupComplete").is_some() {
        events.push(VoiceEvent::SetupComplete);
    }

    let content = value.get("serverContent");

    if let Some(content) = content {
        if content.get("interrupted").and_then(|v| v.as_bool()) == Some(true) {
            events.push(VoiceEvent::Interrupted);
        }
        if let Some(parts) = content
            .pointer("/modelTurn/parts")
            .and_then(|v| v.as_array())
        {
            for part in parts {
                let Some(data_b64) = part.pointer("/inlineData/data").and_then(|v| v.as_str())
                else {
                    continue;
                };
                match base64::engine::general_purpose::STANDARD.decode(data_b64) {
                    Ok(audio_bytes) => events.push(VoiceEvent::Audio { data: audio_bytes }),
                    Err(e) => tracing::warn!(error = %e, "Discarding undecodable audio part"),
                }
            }
        }
    }

    let input = content
        .and_then(|c| c.get("inputTranscription"))
        .or_else(|| value.get("inputTranscription"));
    if let Some(text) = transcription_text(input) {
        events.push(VoiceEvent::InputTranscript { text });
    }

    let output = content
        .and_then(|c| c.get("outputTranscription"))
        .or_else(|| value.get("outputTranscription"));
    if let Some(text) = transcription_text(output) {
        events.push(VoiceEvent::OutputTranscript { text });
    }

    // Turn completion last, so transcript fragments in the same frame land first.
    if content
        .and_then(|c| c.get("turnComplete"))
        .and_then(|v| v.as_bool())
        == Some(true)
    {
        events.push(VoiceEvent::TurnComplete);
    }

    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown server error");
        events.push(VoiceEvent::Error {
            message: message.to_string(),
        });
    }

    events
}

// ── Live session (WebSocket connection manager) ────────────────────

/// Outbound message to send to the Gemini Live WebSocket.
#[derive(Debug)]
enum OutboundMessage {
    /// Raw PCM16LE bytes (wrapped in realtimeInput).
    Audio(Vec<u8>),
    /// Close the connection.
    Close,
}

/// A handle for sending into an open Gemini Live session.
///
/// Created by [`GeminiLiveSession::connect`], which also hands back the
/// receiver of inbound [`VoiceEvent`]s.
pub struct GeminiLiveSession {
    outbound: mpsc::Sender<OutboundMessage>,
    session_id: String,
}

impl GeminiLiveSession {
    /// Connect to the Gemini Live API and wait for `setupComplete`.
    pub async fn connect(
        endpoint: &str,
        api_key: &str,
        config: &LiveSessionConfig,
        setup_timeout: Duration,
    ) -> anyhow::Result<(Self, mpsc::Receiver<VoiceEvent>)> {
        let session_id = config.session_id.clone();
        let url = format!("{endpoint}?key={api_key}");

        tracing::info!(
            session_id = %session_id,
            model = %config.model,
            voice = %config.voice,
            "Connecting to Gemini Live"
        );

        let (mut ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to Gemini Live: {e}"))?;

        let setup_json = serde_json::to_string(&build_setup_message(config))?;
        tracing::debug!(session_id = %session_id, bytes = setup_json.len(), "Sending Gemini Live setup");
        ws_stream
            .send(WsMessage::Text(setup_json.into()))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send setup message: {e}"))?;

        match tokio::time::timeout(setup_timeout, wait_for_setup(&mut ws_stream)).await {
            Ok(Ok(())) => {
                tracing::info!(session_id = %session_id, "Gemini Live setup complete, ready to stream");
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => anyhow::bail!(
                "Gemini Live setupComplete timeout ({}s)",
                setup_timeout.as_secs()
            ),
        }

        let (ws_sender, ws_receiver) = ws_stream.split();
        let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundMessage>(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<VoiceEvent>(CHANNEL_CAPACITY);

        let sid_out = session_id.clone();
        tokio::spawn(async move {
            outbound_loop(outbound_rx, ws_sender, sid_out).await;
        });

        let sid_in = session_id.clone();
        tokio::spawn(async move {
            inbound_loop(ws_receiver, event_tx, sid_in).await;
        });

        Ok((
            Self {
                outbound: outbound_tx,
                session_id,
            },
            event_rx,
        ))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[async_trait]
impl LiveConnection for GeminiLiveSession {
    async fn send_audio(&self, pcm: &[u8]) -> anyhow::Result<()> {
        if pcm.is_empty() {
            return Ok(());
        }
        // Never wait on a congested socket; a late frame is worth nothing.
        self.outbound
            .try_send(OutboundMessage::Audio(pcm.to_vec()))
            .map_err(|e| match e {
                TrySendError::Full(_) => anyhow::anyhow!("outbound queue full, frame dropped"),
                TrySendError::Closed(_) => anyhow::anyhow!("session closed"),
            })
    }

    async fn close(&self) {
        let _ = self.outbound.send(OutboundMessage::Close).await;
    }
}

/// Outcome of one setup-phase frame: `None` keeps waiting.
fn setup_reply(text: &str) -> Option<anyhow::Result<()>> {
    let events = parse_server_message(text);
    if events.contains(&VoiceEvent::SetupComplete) {
        return Some(Ok(()));
    }
    events.into_iter().find_map(|event| match event {
        VoiceEvent::Error { message } => {
            Some(Err(anyhow::anyhow!("Gemini Live rejected setup: {message}")))
        }
        _ => None,
    })
}

async fn wait_for_setup(ws_stream: &mut WsStream) -> anyhow::Result<()> {
    while let Some(msg_result) = ws_stream.next().await {
        let reply = match msg_result {
            Ok(WsMessage::Text(text)) => setup_reply(&text),
            Ok(WsMessage::Binary(data)) if data.first() == Some(&b'{') => {
                std::str::from_utf8(&data).ok().and_then(setup_reply)
            }
            Ok(WsMessage::Close(frame)) => {
                anyhow::bail!("Connection closed before setupComplete: {frame:?}");
            }
            Err(e) => anyhow::bail!("WebSocket error before setupComplete: {e}"),
            other => {
                tracing::debug!(msg = ?other, "Gemini Live setup phase: ignoring frame");
                None
            }
        };
        if let Some(result) = reply {
            return result;
        }
    }
    anyhow::bail!("Stream ended before setupComplete")
}

// ── Internal loops ────────────────────────────────────────────────

/// Outbound loop: encode audio and send to the WebSocket.
///
/// A failed frame is logged and skipped; the loop only ends on `Close` or
/// when every sender is gone.
async fn outbound_loop(
    mut rx: mpsc::Receiver<OutboundMessage>,
    mut ws_sender: SplitSink<WsStream, WsMessage>,
    session_id: String,
) {
    let mut sent: u64 = 0;
    let mut failed: u64 = 0;

    while let Some(msg) = rx.recv().await {
        match msg {
            OutboundMessage::Audio(pcm) => {
                let json = match serde_json::to_string(&build_audio_message(&pcm)) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(session_id = %session_id, error = %e, "Failed to serialize audio message");
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(WsMessage::Text(json.into())).await {
                    failed += 1;
                    tracing::warn!(
                        session_id = %session_id,
                        error = %e,
                        failed = failed,
                        "Audio frame send failed"
                    );
                    continue;
                }
                sent += 1;
                if sent == 1 || sent.is_multiple_of(50) {
                    tracing::debug!(
                        session_id = %session_id,
                        frames = sent,
                        pcm_bytes = pcm.len(),
                        "Streaming audio to Gemini"
                    );
                }
            }
            OutboundMessage::Close => {
                let _ = ws_sender.send(WsMessage::Close(None)).await;
                break;
            }
        }
    }

    tracing::debug!(session_id = %session_id, sent, failed, "Outbound loop terminated");
}

/// Inbound loop: receive frames, parse them and forward events.
///
/// Dropping `event_tx` on exit is how the session signals it has ended.
async fn inbound_loop(
    mut ws_receiver: SplitStream<WsStream>,
    event_tx: mpsc::Sender<VoiceEvent>,
    session_id: String,
) {
    let start_time = Instant::now();
    let mut audio_chunks: u64 = 0;
    let mut turns: u64 = 0;

    while let Some(msg_result) = ws_receiver.next().await {
        let events = match msg_result {
            Ok(WsMessage::Text(text)) => parse_server_message(&text),
            Ok(WsMessage::Binary(data)) => {
                if data.first() != Some(&b'{') {
                    tracing::warn!(
                        session_id = %session_id,
                        len = data.len(),
                        "Unexpected non-JSON binary frame from Gemini Live, skipping"
                    );
                    continue;
                }
                match std::str::from_utf8(&data) {
                    Ok(text) => parse_server_message(text),
                    Err(_) => continue,
                }
            }
            Ok(WsMessage::Close(frame)) => {
                tracing::info!(session_id = %session_id, close_frame = ?frame, "Gemini Live connection closed");
                break;
            }
            Ok(_) => continue, // ping/pong handled by tungstenite
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Gemini Live WebSocket error");
                let _ = event_tx
                    .send(VoiceEvent::Error {
                        message: format!("WebSocket error: {e}"),
                    })
                    .await;
                break;
            }
        };

        let elapsed = start_time.elapsed().as_secs_f32();
        for event in events {
            match &event {
                VoiceEvent::Audio { data } => {
                    audio_chunks += 1;
                    tracing::trace!(session_id = %session_id, elapsed_s = elapsed, bytes = data.len(), "⬇ audio");
                }
                VoiceEvent::TurnComplete => {
                    turns += 1;
                    tracing::debug!(session_id = %session_id, elapsed_s = elapsed, turn = turns, audio_chunks, "⬇ Turn complete");
                }
                VoiceEvent::InputTranscript { text } | VoiceEvent::OutputTranscript { text } => {
                    tracing::debug!(session_id = %session_id, elapsed_s = elapsed, text = %text, "⬇ Transcript");
                }
                _ => {}
            }
            if event_tx.send(event).await.is_err() {
                tracing::debug!(session_id = %session_id, "Event receiver dropped, closing inbound loop");
                return;
            }
        }
    }

    tracing::debug!(session_id = %session_id, "Inbound loop terminated");
}

// ── Vendor ─────────────────────────────────────────────────────────

/// [`LiveVendor`] backed by Gemini Live.
pub struct GeminiLiveVendor {
    api_key: String,
    endpoint: String,
    setup_timeout: Duration,
}

impl GeminiLiveVendor {
    pub fn new(api_key: String, endpoint: String, setup_timeout: Duration) -> Self {
        Self {
            api_key,
            endpoint,
            setup_timeout,
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Result<Self, ConsultError> {
        Ok(Self::new(
            config.api_key()?.to_string(),
            config.vendor.live_endpoint.clone(),
            config.setup_timeout(),
        ))
    }
}

#[async_trait]
impl LiveVendor for GeminiLiveVendor {
    async fn open_session(
        &self,
        config: &LiveSessionConfig,
    ) -> Result<LiveSessionHandle, ConsultError> {
        let (session, events) =
            GeminiLiveSession::connect(&self.endpoint, &self.api_key, config, self.setup_timeout)
                .await
                .map_err(|e| ConsultError::Transport(e.to_string()))?;
        Ok(LiveSessionHandle {
            connection: std::sync::Arc::new(session),
            events,
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────

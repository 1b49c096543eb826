#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use sales_consult::audio::{
    AudioBackend, AudioDevices, AudioSession, AudioSpec, ChunkId, PlaybackClock, PlaybackOutput,
};
use sales_consult::config::BrandingConfig;
use sales_consult::error::ConsultError;
use sales_consult::intake::{ContactRecord, IntakeForm, Interest};
use sales_consult::voice::{
    CallSettings, LiveConnection, LiveSessionConfig, LiveSessionHandle, LiveVendor, SessionController,
    TextGenerator, VoiceEvent,
};

// ── Live vendor ───────────────────────────────────────────────────

#[derive(Default)]
pub struct VendorState {
    pub opened: Mutex<Vec<LiveSessionConfig>>,
    pub sent: Mutex<Vec<Vec<u8>>>,
    pub fail_sends: AtomicBool,
    pub refuse_open: AtomicBool,
    pub closed: AtomicBool,
    events: Mutex<Option<mpsc::Sender<VoiceEvent>>>,
}

impl VendorState {
    /// Deliver an event as if the vendor sent it. Returns false once the call stopped listening.
    pub async fn emit(&self, event: VoiceEvent) -> bool {
        let tx = self.events.lock().clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Vendor closes the session from its side.
    pub fn hang_up(&self) {
        self.events.lock().take();
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

pub struct FakeVendor(pub Arc<VendorState>);

struct FakeConnection(Arc<VendorState>);

#[async_trait]
impl LiveConnection for FakeConnection {
    async fn send_audio(&self, pcm: &[u8]) -> anyhow::Result<()> {
        if self.0.fail_sends.load(Ordering::SeqCst) {
            anyhow::bail!("socket buffer full");
        }
        self.0.sent.lock().push(pcm.to_vec());
        Ok(())
    }

    async fn close(&self) {
        self.0.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LiveVendor for FakeVendor {
    async fn open_session(&self, config: &LiveSessionConfig) -> Result<LiveSessionHandle, ConsultError> {
        if self.0.refuse_open.load(Ordering::SeqCst) {
            return Err(ConsultError::Transport("handshake rejected".into()));
        }
        self.0.opened.lock().push(config.clone());
        let (tx, rx) = mpsc::channel(64);
        *self.0.events.lock() = Some(tx);
        Ok(LiveSessionHandle {
            connection: Arc::new(FakeConnection(Arc::clone(&self.0))),
            events: rx,
        })
    }
}

// ── Audio ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct AudioState {
    pub deny: AtomicBool,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub resumed: AtomicUsize,
    pub started: Mutex<Vec<(ChunkId, usize, Duration)>>,
    pub stopped: Mutex<Vec<ChunkId>>,
    frames: Mutex<Option<mpsc::UnboundedSender<Vec<f32>>>>,
    ended: Mutex<Option<mpsc::UnboundedSender<ChunkId>>>,
}

impl AudioState {
    /// Feed one captured microphone frame. False once capture is closed.
    pub fn capture(&self, frame: Vec<f32>) -> bool {
        match self.frames.lock().as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Report a chunk as finished playing.
    pub fn finish(&self, id: ChunkId) {
        if let Some(tx) = self.ended.lock().as_ref() {
            let _ = tx.send(id);
        }
    }

    pub fn started_ids(&self) -> Vec<ChunkId> {
        self.started.lock().iter().map(|(id, _, _)| *id).collect()
    }
}

pub struct FakeAudio(pub Arc<AudioState>);

struct RecordingOutput(Arc<AudioState>);

impl PlaybackClock for RecordingOutput {
    fn now(&self) -> Duration {
        Duration::ZERO
    }
}

impl PlaybackOutput for RecordingOutput {
    fn start(&self, id: ChunkId, samples: Vec<f32>, at: Duration) {
        self.0.started.lock().push((id, samples.len(), at));
    }

    fn stop(&self, id: ChunkId) {
        self.0.stopped.lock().push(id);
    }
}

struct CountingDevices(Arc<AudioState>);

impl AudioDevices for CountingDevices {
    fn resume(&self) {
        self.0.resumed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for CountingDevices {
    fn drop(&mut self) {
        self.0.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl AudioBackend for FakeAudio {
    fn acquire(&self, spec: &AudioSpec) -> Result<AudioSession, ConsultError> {
        if self.0.deny.load(Ordering::SeqCst) {
            return Err(ConsultError::Device("Permission denied".into()));
        }
        self.0.acquired.fetch_add(1, Ordering::SeqCst);
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        *self.0.frames.lock() = Some(frames_tx);
        *self.0.ended.lock() = Some(ended_tx);
        Ok(AudioSession::new(
            frames_rx,
            ended_rx,
            Arc::new(RecordingOutput(Arc::clone(&self.0))),
            spec.playback_sample_rate,
            Box::new(CountingDevices(Arc::clone(&self.0))),
        ))
    }
}

// ── Text generation ───────────────────────────────────────────────

pub struct ScriptedText {
    pub reply: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedText {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate_text(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

// ── Wiring ────────────────────────────────────────────────────────

pub struct Harness {
    pub controller: SessionController,
    pub vendor: Arc<VendorState>,
    pub audio: Arc<AudioState>,
}

pub fn harness() -> Harness {
    let vendor = Arc::new(VendorState::default());
    let audio = Arc::new(AudioState::default());
    let settings = CallSettings {
        model: "gemini-2.0-flash-exp".into(),
        voice: "Kore".into(),
        audio: AudioSpec::default(),
        liveness_interval: Duration::from_millis(50),
        branding: BrandingConfig::default(),
    };
    let controller = SessionController::new(
        Arc::new(FakeVendor(Arc::clone(&vendor))),
        Arc::new(FakeAudio(Arc::clone(&audio))),
        settings,
    );
    Harness {
        controller,
        vendor,
        audio,
    }
}

pub fn asha() -> ContactRecord {
    IntakeForm {
        name: "Asha".into(),
        email: "asha@nimbus.example".into(),
        company: "Nimbus Retail".into(),
        interest: Some(Interest::CloudSolutions),
        ..Default::default()
    }
    .submit()
    .unwrap()
}

/// Poll `cond` until it holds, failing the test after two seconds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}

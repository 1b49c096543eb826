use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Gemini Live BidiGenerateContent endpoint.
pub const DEFAULT_LIVE_ENDPOINT: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// REST base for one-shot generation.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub vendor: VendorConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub branding: BrandingConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ── Vendor ────────────────────────────────────────────────────────

/// Gemini endpoints, models and credential.
#[derive(Clone, Serialize, Deserialize, JsonSchema)]
pub struct VendorConfig {
    /// API key. Prefer the `GEMINI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for the live voice session.
    #[serde(default = "default_live_model")]
    pub live_model: String,

    /// Model used for proposal generation.
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Prebuilt voice for synthesized speech.
    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_live_endpoint")]
    pub live_endpoint: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Seconds to wait for `setupComplete` after connecting.
    #[serde(default = "default_setup_timeout_secs")]
    pub setup_timeout_secs: u64,

    /// Seconds before a proposal request is abandoned for the fallback document.
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
}

// Keep the key out of logs.
impl std::fmt::Debug for VendorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("live_model", &self.live_model)
            .field("text_model", &self.text_model)
            .field("voice", &self.voice)
            .field("live_endpoint", &self.live_endpoint)
            .field("api_base", &self.api_base)
            .field("setup_timeout_secs", &self.setup_timeout_secs)
            .field("generation_timeout_secs", &self.generation_timeout_secs)
            .finish()
    }
}

fn default_live_model() -> String {
    "gemini-2.0-flash-exp".into()
}

fn default_text_model() -> String {
    "gemini-2.0-flash-exp".into()
}

fn default_voice() -> String {
    "Kore".into()
}

fn default_live_endpoint() -> String {
    DEFAULT_LIVE_ENDPOINT.into()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}

fn default_setup_timeout_secs() -> u64 {
    15
}

fn default_generation_timeout_secs() -> u64 {
    120
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            live_model: default_live_model(),
            text_model: default_text_model(),
            voice: default_voice(),
            live_endpoint: default_live_endpoint(),
            api_base: default_api_base(),
            setup_timeout_secs: default_setup_timeout_secs(),
            generation_timeout_secs: default_generation_timeout_secs(),
        }
    }
}

// ── Audio ─────────────────────────────────────────────────────────

/// Capture and playback tuning.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AudioConfig {
    /// Samples per outbound frame at 16 kHz.
    #[serde(default = "default_frame_samples")]
    pub capture_frame_samples: usize,

    /// How often the device streams are nudged awake.
    #[serde(default = "default_liveness_interval_ms")]
    pub liveness_interval_ms: u64,

    #[serde(default = "default_true")]
    pub echo_cancellation: bool,

    #[serde(default = "default_true")]
    pub noise_suppression: bool,

    #[serde(default = "default_true")]
    pub auto_gain_control: bool,
}

fn default_frame_samples() -> usize {
    4096
}

fn default_liveness_interval_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_frame_samples: default_frame_samples(),
            liveness_interval_ms: default_liveness_interval_ms(),
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

// ── Branding ──────────────────────────────────────────────────────

/// Who the consultant speaks for. Interpolated into prompts and the print footer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BrandingConfig {
    #[serde(default = "default_company")]
    pub company: String,

    /// Name the voice assistant introduces itself with.
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Contact lines for the print footer; empty ones are omitted.
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub phone: String,

    #[serde(default)]
    pub website: String,
}

fn default_company() -> String {
    "Cehpoint".into()
}

fn default_persona() -> String {
    "Dhanalakshmi AI".into()
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            company: default_company(),
            persona: default_persona(),
            email: String::new(),
            phone: String::new(),
            website: String::new(),
        }
    }
}

// ── Export ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExportConfig {
    /// Directory "Save text" writes into. Defaults to the working directory.
    #[serde(default)]
    pub output_dir: Option<String>,

    #[serde(default = "default_file_name")]
    pub file_name: String,
}

fn default_file_name() -> String {
    "Business_Proposal.txt".into()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            file_name: default_file_name(),
        }
    }
}

// ── Logging ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "sales_consult=debug,warn".
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

//! Configuration loading from file and environment variables.
//!
//! Resolution order: built-in defaults, then `~/.sales-consult/config.toml`
//! (or the path given with `--config`), then environment overrides.

pub mod schema;

pub use schema::{AudioConfig, BrandingConfig, Config, ExportConfig, LoggingConfig, VendorConfig};

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::error::{ConsultError, API_KEY_ENV};

const CONFIG_DIR: &str = ".sales-consult";
const CONFIG_FILE: &str = "config.toml";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<ConfigError> for ConsultError {
    fn from(err: ConfigError) -> Self {
        ConsultError::Config(err.to_string())
    }
}

/// Default location of the config file: `~/.sales-consult/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    directories::UserDirs::new().map(|dirs| dirs.home_dir().join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Loads configuration, falling back to defaults when the file is absent.
///
/// Environment variable overrides:
/// - `GEMINI_API_KEY` overrides `vendor.api_key`
/// - `SALES_CONSULT_LIVE_MODEL` overrides `vendor.live_model`
/// - `SALES_CONSULT_TEXT_MODEL` overrides `vendor.text_model`
/// - `SALES_CONSULT_VOICE` overrides `vendor.voice`
/// - `SALES_CONSULT_LOG` overrides `logging.level`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// or if a value fails validation.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map(Path::to_path_buf).or_else(default_config_path);

    let mut config = match path {
        Some(p) => match std::fs::read_to_string(&p) {
            Ok(contents) => toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: p.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %p.display(), "config file not found, using defaults");
                Config::default()
            }
            Err(source) => return Err(ConfigError::FileRead { path: p, source }),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Applies overrides from a variable lookup. Empty values are ignored.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = get(API_KEY_ENV) {
        config.vendor.api_key = Some(key);
    }
    if let Some(model) = get("SALES_CONSULT_LIVE_MODEL") {
        config.vendor.live_model = model;
    }
    if let Some(model) = get("SALES_CONSULT_TEXT_MODEL") {
        config.vendor.text_model = model;
    }
    if let Some(voice) = get("SALES_CONSULT_VOICE") {
        config.vendor.voice = voice;
    }
    if let Some(level) = get("SALES_CONSULT_LOG") {
        config.logging.level = level;
    }
}

impl Config {
    /// Rejects values that would stall or break a call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.capture_frame_samples == 0 {
            return Err(ConfigError::Invalid {
                field: "audio.capture_frame_samples",
                reason: "must be greater than zero".into(),
            });
        }
        if self.audio.liveness_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "audio.liveness_interval_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.vendor.setup_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "vendor.setup_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.vendor.generation_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "vendor.generation_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.export.file_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "export.file_name",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// The vendor credential, required before any session is attempted.
    pub fn api_key(&self) -> Result<&str, ConsultError> {
        self.vendor
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConsultError::MissingCredential)
    }

    pub fn setup_timeout(&self) -> Duration {
        Duration::from_secs(self.vendor.setup_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.vendor.generation_timeout_secs)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.audio.liveness_interval_ms)
    }

    /// Where "Save text" writes the document.
    pub fn export_path(&self) -> PathBuf {
        let dir = self
            .export
            .output_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        dir.join(&self.export.file_name)
    }

    /// JSON schema of the config file, pretty-printed.
    pub fn json_schema() -> anyhow::Result<String> {
        let schema = schemars::schema_for!(Config);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_call_requirements() {
        let config = Config::default();
        assert_eq!(config.vendor.voice, "Kore");
        assert_eq!(config.audio.capture_frame_samples, 4096);
        assert_eq!(config.liveness_interval(), Duration::from_secs(2));
        assert_eq!(config.generation_timeout(), Duration::from_secs(120));
        assert!(config.audio.echo_cancellation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.export.file_name, "Business_Proposal.txt");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[vendor]\nvoice = \"Puck\"\n\n[branding]\ncompany = \"Acme\"\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.vendor.voice, "Puck");
        assert_eq!(config.branding.company, "Acme");
        assert_eq!(config.branding.persona, "Dhanalakshmi AI");
        assert_eq!(config.vendor.setup_timeout_secs, 15);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[vendor\nvoice=").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn zero_frame_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[audio]\ncapture_frame_samples = 0\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("audio.capture_frame_samples"));
    }

    #[test]
    fn env_overrides_apply_and_ignore_blank_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("GEMINI_API_KEY", "k-123"),
            ("SALES_CONSULT_VOICE", "Charon"),
            ("SALES_CONSULT_TEXT_MODEL", "  "),
        ]);
        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_key().unwrap(), "k-123");
        assert_eq!(config.vendor.voice, "Charon");
        assert_eq!(config.vendor.text_model, "gemini-2.0-flash-exp");
    }

    #[test]
    fn blank_api_key_is_missing_credential() {
        let mut config = Config::default();
        config.vendor.api_key = Some("   ".into());
        assert!(matches!(
            config.api_key(),
            Err(ConsultError::MissingCredential)
        ));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let mut config = Config::default();
        config.vendor.api_key = Some("super-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn export_path_joins_output_dir() {
        let mut config = Config::default();
        config.export.output_dir = Some("/tmp/out".into());
        assert_eq!(
            config.export_path(),
            PathBuf::from("/tmp/out/Business_Proposal.txt")
        );
    }

    #[test]
    fn json_schema_lists_sections() {
        let schema = Config::json_schema().unwrap();
        assert!(schema.contains("vendor"));
        assert!(schema.contains("branding"));
    }
}

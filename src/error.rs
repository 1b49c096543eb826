//! Error taxonomy for a consultation.
//!
//! Each variant is handled at the boundary where it occurs: configuration
//! errors stop the flow before a call, device errors send the user back to
//! intake, transport errors end the call. Per-frame send failures, generation
//! failures and abuse termination are deliberately not errors here; they are
//! absorbed by the component that sees them.

use thiserror::Error;

/// Name of the environment variable holding the vendor credential.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Failures that can abort a consultation step.
#[derive(Debug, Error)]
pub enum ConsultError {
    /// Configuration is present but unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// No vendor credential was found.
    #[error("API Key missing. Please check configuration. (set {API_KEY_ENV} or vendor.api_key)")]
    MissingCredential,

    /// Microphone denied, missing, or the output device failed to open.
    #[error("Audio device unavailable (microphone or speaker): {0}")]
    Device(String),

    /// The live session could not be opened or broke down.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConsultError {
    /// Whether this error should return the user to the intake screen.
    pub fn reverts_to_intake(&self) -> bool {
        matches!(self, Self::Device(_) | Self::Transport(_))
    }
}

impl From<cpal::BuildStreamError> for ConsultError {
    fn from(err: cpal::BuildStreamError) -> Self {
        Self::Device(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for ConsultError {
    fn from(err: cpal::PlayStreamError) -> Self {
        Self::Device(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_message_names_env_var() {
        let msg = ConsultError::MissingCredential.to_string();
        assert!(msg.starts_with("API Key missing"));
        assert!(msg.contains(API_KEY_ENV));
    }

    #[test]
    fn device_and_transport_revert_to_intake() {
        assert!(ConsultError::Device("denied".into()).reverts_to_intake());
        assert!(ConsultError::Transport("refused".into()).reverts_to_intake());
        assert!(!ConsultError::MissingCredential.reverts_to_intake());
        assert!(!ConsultError::Config("bad".into()).reverts_to_intake());
    }

    #[test]
    fn device_message_fits_speaker_failures() {
        let msg = ConsultError::Device("no output device available".into()).to_string();
        assert_eq!(
            msg,
            "Audio device unavailable (microphone or speaker): no output device available"
        );
        assert!(!msg.contains("Microphone access denied"));
    }
}

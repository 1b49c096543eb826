//! Proposal generation from a finished consultation.
//!
//! [`ProposalGenerator::generate`] is total: a vendor failure, an empty
//! answer or a timeout each become a fixed fallback document, so the view
//! always has something to render.

pub mod export;
pub mod prompt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::BrandingConfig;
use crate::intake::ContactRecord;
use crate::transcript::Transcript;
use crate::voice::TextGenerator;

pub use prompt::{build_prompt, COMPLETION_MARKER};

/// Shown when the vendor answers with no text.
pub const EMPTY_RESPONSE_FALLBACK: &str = "Proposal generation failed. Please contact support.";

/// Shown when the request fails or times out.
pub const ERROR_FALLBACK: &str =
    "# Error\n\nUnable to generate proposal at this time. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOrigin {
    Vendor,
    EmptyFallback,
    ErrorFallback,
}

/// Generated proposal text, as returned by the vendor or a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDocument {
    text: String,
    origin: DocumentOrigin,
    generated_at: DateTime<Local>,
}

impl ProposalDocument {
    pub fn new(text: impl Into<String>, origin: DocumentOrigin) -> Self {
        Self {
            text: text.into(),
            origin,
            generated_at: Local::now(),
        }
    }

    /// Raw text exactly as produced.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text for display and export: completion marker removed, trimmed.
    pub fn cleaned(&self) -> String {
        self.text.replace(COMPLETION_MARKER, "").trim().to_string()
    }

    pub fn origin(&self) -> DocumentOrigin {
        self.origin
    }

    pub fn is_fallback(&self) -> bool {
        self.origin != DocumentOrigin::Vendor
    }

    pub fn generated_at(&self) -> DateTime<Local> {
        self.generated_at
    }
}

pub struct ProposalGenerator {
    generator: Arc<dyn TextGenerator>,
    branding: BrandingConfig,
    timeout: Duration,
}

impl ProposalGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, branding: BrandingConfig, timeout: Duration) -> Self {
        Self {
            generator,
            branding,
            timeout,
        }
    }

    /// Produce a proposal for `contact` from the full `transcript`. Never fails.
    pub async fn generate(&self, contact: &ContactRecord, transcript: &Transcript) -> ProposalDocument {
        let prompt = build_prompt(&self.branding, contact, transcript, Local::now());
        tracing::info!(
            utterances = transcript.len(),
            prompt_chars = prompt.len(),
            "Generating proposal"
        );

        match tokio::time::timeout(self.timeout, self.generator.generate_text(&prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                ProposalDocument::new(text, DocumentOrigin::Vendor)
            }
            Ok(Ok(_)) => {
                tracing::warn!("Proposal generation returned no text");
                ProposalDocument::new(EMPTY_RESPONSE_FALLBACK, DocumentOrigin::EmptyFallback)
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Proposal generation failed");
                ProposalDocument::new(ERROR_FALLBACK, DocumentOrigin::ErrorFallback)
            }
            Err(_) => {
                tracing::error!(timeout_secs = self.timeout.as_secs(), "Proposal generation timed out");
                ProposalDocument::new(ERROR_FALLBACK, DocumentOrigin::ErrorFallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{IntakeForm, Interest};
    use crate::transcript::Role;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    enum Reply {
        Text(&'static str),
        Fail,
        Hang,
    }

    struct ScriptedGenerator {
        reply: Reply,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate_text(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().push(prompt.to_string());
            match self.reply {
                Reply::Text(t) => Ok(t.to_string()),
                Reply::Fail => anyhow::bail!("network unreachable"),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("too late".into())
                }
            }
        }
    }

    fn generator(reply: Reply) -> (ProposalGenerator, Arc<ScriptedGenerator>) {
        let scripted = Arc::new(ScriptedGenerator {
            reply,
            prompts: Mutex::new(Vec::new()),
        });
        let gen = ProposalGenerator::new(
            scripted.clone(),
            BrandingConfig::default(),
            Duration::from_millis(100),
        );
        (gen, scripted)
    }

    fn contact() -> ContactRecord {
        IntakeForm {
            name: "Asha".into(),
            company: "Nimbus Retail".into(),
            interest: Some(Interest::CloudSolutions),
            ..Default::default()
        }
        .submit()
        .unwrap()
    }

    fn transcript(k: usize) -> Transcript {
        let mut t = Transcript::new();
        for i in 0..k {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            t.push(role, format!("line {i}"));
        }
        t
    }

    #[tokio::test]
    async fn vendor_text_is_returned_verbatim() {
        let (gen, scripted) = generator(Reply::Text("# Proposal\n\nBody [CONSULTATION_COMPLETED]\n"));
        let doc = gen.generate(&contact(), &transcript(2)).await;

        assert_eq!(doc.origin(), DocumentOrigin::Vendor);
        assert_eq!(doc.text(), "# Proposal\n\nBody [CONSULTATION_COMPLETED]\n");
        assert_eq!(doc.cleaned(), "# Proposal\n\nBody");
        assert!(scripted.prompts.lock()[0].contains("USER: line 0\nASSISTANT: line 1"));
    }

    #[tokio::test]
    async fn generate_is_total_for_every_vendor_outcome() {
        for k in [0, 1, 5] {
            for reply in [Reply::Text("ok"), Reply::Text("   "), Reply::Fail, Reply::Hang] {
                let (gen, _) = generator(reply);
                let doc = gen.generate(&contact(), &transcript(k)).await;
                assert!(!doc.cleaned().is_empty());
            }
        }
    }

    #[tokio::test]
    async fn empty_response_uses_support_fallback() {
        let (gen, _) = generator(Reply::Text("\n  \n"));
        let doc = gen.generate(&contact(), &transcript(1)).await;
        assert_eq!(doc.origin(), DocumentOrigin::EmptyFallback);
        assert_eq!(doc.text(), EMPTY_RESPONSE_FALLBACK);
        assert!(doc.is_fallback());
    }

    #[tokio::test]
    async fn failure_uses_error_fallback() {
        let (gen, _) = generator(Reply::Fail);
        let doc = gen.generate(&contact(), &transcript(1)).await;
        assert_eq!(doc.origin(), DocumentOrigin::ErrorFallback);
        assert!(doc.text().starts_with("# Error"));
    }

    #[tokio::test]
    async fn hung_request_times_out_into_error_fallback() {
        let (gen, _) = generator(Reply::Hang);
        let doc = gen.generate(&contact(), &transcript(1)).await;
        assert_eq!(doc.origin(), DocumentOrigin::ErrorFallback);
    }
}

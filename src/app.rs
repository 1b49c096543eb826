//! Presentation state machine.
//!
//! Each screen is its own type and only exposes the transitions that are
//! legal from it, so e.g. resetting from a consultation does not compile.
//! [`Screen`] wraps them for event-driven callers and rejects illegal
//! events at runtime.

use std::fmt;

use crate::intake::ContactRecord;
use crate::proposal::ProposalDocument;
use crate::transcript::Transcript;

/// Which screen is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppPhase {
    Form,
    Consultation,
    ProposalGeneration,
    ProposalView,
    Terminated,
}

impl fmt::Display for AppPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Form => "FORM",
            Self::Consultation => "CONSULTATION",
            Self::ProposalGeneration => "PROPOSAL_GENERATION",
            Self::ProposalView => "PROPOSAL_VIEW",
            Self::Terminated => "TERMINATED",
        })
    }
}

// ── Screens ───────────────────────────────────────────────────────

/// Intake form. Holds no contact; a notice explains a failed call attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormScreen {
    notice: Option<String>,
}

impl FormScreen {
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn submit(self, contact: ContactRecord) -> ConsultationScreen {
        ConsultationScreen { contact }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsultationScreen {
    contact: ContactRecord,
}

impl ConsultationScreen {
    pub fn contact(&self) -> &ContactRecord {
        &self.contact
    }

    /// The user asked for the proposal; the transcript moves along.
    pub fn generate(self, transcript: Transcript) -> GenerationScreen {
        GenerationScreen {
            contact: self.contact,
            transcript,
        }
    }

    /// The assistant ended the call for abuse.
    pub fn terminate(self) -> TerminatedScreen {
        TerminatedScreen { _private: () }
    }

    /// Microphone or connection could not be set up.
    pub fn abort(self, reason: impl Into<String>) -> FormScreen {
        FormScreen {
            notice: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationScreen {
    contact: ContactRecord,
    transcript: Transcript,
}

impl GenerationScreen {
    pub fn contact(&self) -> &ContactRecord {
        &self.contact
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Generation finished, with real text or a fallback.
    pub fn complete(self, document: ProposalDocument) -> ProposalScreen {
        ProposalScreen {
            contact: self.contact,
            document,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProposalScreen {
    contact: ContactRecord,
    document: ProposalDocument,
}

impl ProposalScreen {
    pub fn contact(&self) -> &ContactRecord {
        &self.contact
    }

    pub fn document(&self) -> &ProposalDocument {
        &self.document
    }

    /// Start over. Contact, transcript and document are dropped.
    pub fn reset(self) -> FormScreen {
        FormScreen::default()
    }
}

/// Terminal state. There is no way out short of restarting the program.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminatedScreen {
    _private: (),
}

// ── Dynamic wrapper ───────────────────────────────────────────────

/// Something that happened which may move the app to another screen.
#[derive(Debug, Clone)]
pub enum ScreenEvent {
    Submit(ContactRecord),
    CallFailed(String),
    AbuseDetected,
    Generate(Transcript),
    GenerationFinished(ProposalDocument),
    Reset,
}

impl ScreenEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Submit(_) => "submit",
            Self::CallFailed(_) => "call_failed",
            Self::AbuseDetected => "abuse_detected",
            Self::Generate(_) => "generate",
            Self::GenerationFinished(_) => "generation_finished",
            Self::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply `{event}` in state {from}")]
pub struct IllegalTransition {
    pub from: AppPhase,
    pub event: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Form(FormScreen),
    Consultation(ConsultationScreen),
    ProposalGeneration(GenerationScreen),
    ProposalView(ProposalScreen),
    Terminated(TerminatedScreen),
}

impl Default for Screen {
    fn default() -> Self {
        Self::Form(FormScreen::default())
    }
}

impl Screen {
    pub fn phase(&self) -> AppPhase {
        match self {
            Self::Form(_) => AppPhase::Form,
            Self::Consultation(_) => AppPhase::Consultation,
            Self::ProposalGeneration(_) => AppPhase::ProposalGeneration,
            Self::ProposalView(_) => AppPhase::ProposalView,
            Self::Terminated(_) => AppPhase::Terminated,
        }
    }

    /// Apply an event. On an illegal event the screen is left unchanged.
    pub fn apply(&mut self, event: ScreenEvent) -> Result<AppPhase, IllegalTransition> {
        let current = std::mem::take(self);
        let next = match (current, event) {
            (Self::Form(s), ScreenEvent::Submit(contact)) => Self::Consultation(s.submit(contact)),
            (Self::Consultation(s), ScreenEvent::CallFailed(reason)) => Self::Form(s.abort(reason)),
            (Self::Consultation(s), ScreenEvent::AbuseDetected) => Self::Terminated(s.terminate()),
            (Self::Consultation(s), ScreenEvent::Generate(transcript)) => {
                Self::ProposalGeneration(s.generate(transcript))
            }
            (Self::ProposalGeneration(s), ScreenEvent::GenerationFinished(doc)) => {
                Self::ProposalView(s.complete(doc))
            }
            (Self::ProposalView(s), ScreenEvent::Reset) => Self::Form(s.reset()),
            (current, event) => {
                let err = IllegalTransition {
                    from: current.phase(),
                    event: event.name(),
                };
                *self = current;
                return Err(err);
            }
        };
        *self = next;
        Ok(self.phase())
    }

    /// Contact in play, if any screen holds one.
    pub fn contact(&self) -> Option<&ContactRecord> {
        match self {
            Self::Consultation(s) => Some(s.contact()),
            Self::ProposalGeneration(s) => Some(s.contact()),
            Self::ProposalView(s) => Some(s.contact()),
            Self::Form(_) | Self::Terminated(_) => None,
        }
    }
}

//! Terminal presentation.
//!
//! Everything here that only formats text is a plain function so it can be
//! tested without a TTY. The interactive driver lives in [`terminal`].

pub mod terminal;

use console::style;

use crate::app::AppPhase;
use crate::intake::Interest;
use crate::proposal::ProposalDocument;
use crate::transcript::{Role, Utterance};
use crate::voice::{CallStatus, EndReason};

pub use terminal::{exit_code, run_consultation, Interrupted};

/// Choices on the proposal view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
    SaveText,
    Print,
    BackToHome,
    Quit,
}

impl ViewAction {
    pub const ALL: [ViewAction; 4] = [Self::SaveText, Self::Print, Self::BackToHome, Self::Quit];

    pub fn label(self) -> &'static str {
        match self {
            Self::SaveText => "Save as text file",
            Self::Print => "Print",
            Self::BackToHome => "Back to home",
            Self::Quit => "Quit",
        }
    }
}

pub fn interest_labels() -> Vec<&'static str> {
    Interest::ALL.iter().map(|i| i.label()).collect()
}

/// One-line call status: connection message, speaking indicator, counters.
pub fn status_line(status: &CallStatus) -> String {
    let dot = if status.active {
        style("●").green()
    } else {
        style("●").red()
    };
    let mut line = format!("{dot} {}", status.connection);
    if status.assistant_speaking {
        line.push_str(&format!("  {}", style("🔊 speaking").cyan()));
    }
    if status.active {
        line.push_str(&format!("  frames sent: {}", status.frames_sent));
    }
    if status.frames_dropped > 0 {
        line.push_str(&format!(
            "  {}",
            style(format!("degraded audio ({} frames dropped)", status.frames_dropped)).yellow()
        ));
    }
    line
}

/// One transcript line as it appears under the status line.
pub fn transcript_line(utterance: &Utterance, persona: &str) -> String {
    match utterance.role {
        Role::User => format!("{} {}", style("You:").bold(), utterance.text.trim()),
        Role::Assistant => format!(
            "{} {}",
            style(format!("{persona}:")).cyan().bold(),
            utterance.text.trim()
        ),
    }
}

/// Banner shown when a screen is entered.
pub fn phase_banner(phase: AppPhase) -> &'static str {
    match phase {
        AppPhase::Form => "Tell us about yourself to start a consultation.",
        AppPhase::Consultation => "You are live. Speak naturally. Press Enter to end the call and get your proposal.",
        AppPhase::ProposalGeneration => "Preparing your proposal...",
        AppPhase::ProposalView => "Your proposal is ready.",
        AppPhase::Terminated => "This session has been terminated.",
    }
}

/// What the user is told after the call stops on its own.
pub fn end_notice(reason: &EndReason) -> Option<String> {
    match reason {
        EndReason::UserEnded => None,
        EndReason::Terminated => Some(
            "The consultation was ended due to a violation of the usage policy. Restart the program to begin again."
                .into(),
        ),
        EndReason::Disconnected => {
            Some("The call was disconnected. Press Enter to generate your proposal from what was said.".into())
        }
        EndReason::TransportError(e) => Some(format!(
            "Connection error ({e}). Press Enter to generate your proposal from what was said."
        )),
    }
}

/// Proposal as shown on screen; fallbacks are highlighted.
pub fn proposal_view(document: &ProposalDocument) -> String {
    let body = document.cleaned();
    if document.is_fallback() {
        format!("{}\n", style(body).yellow())
    } else {
        format!("{body}\n")
    }
}

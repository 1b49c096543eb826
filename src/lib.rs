//! Voice sales consultation: intake, a live Gemini call, and a generated
//! business proposal.
//!
//! The flow is driven by the screen state machine in [`app`]; [`voice`]
//! owns the call, [`audio`] the devices and playback timing, and
//! [`proposal`] the document.

pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod intake;
pub mod proposal;
pub mod transcript;
pub mod ui;
pub mod voice;

pub use app::{AppPhase, IllegalTransition, Screen, ScreenEvent};
pub use config::Config;
pub use error::ConsultError;
pub use intake::{ContactRecord, IntakeForm, Interest};
pub use proposal::{ProposalDocument, ProposalGenerator};
pub use transcript::{Role, Transcript};

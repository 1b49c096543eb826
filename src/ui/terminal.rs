//! Interactive driver: walks the screen state machine on a real terminal.

use std::future::Future;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use console::{style, Term};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, FuzzySelect, Input, Select};
use tokio::sync::oneshot;

use super::{
    end_notice, interest_labels, phase_banner, proposal_view, status_line, transcript_line, ViewAction,
};
use crate::app::{AppPhase, Screen, ScreenEvent};
use crate::audio::CpalBackend;
use crate::config::Config;
use crate::intake::{ContactRecord, IntakeForm, Interest};
use crate::proposal::{export, ProposalGenerator};
use crate::voice::{CallSettings, EndReason, GeminiLiveVendor, GeminiTextClient, SessionController};

/// The user pressed Ctrl-C.
#[derive(Debug, thiserror::Error)]
#[error("interrupted by user")]
pub struct Interrupted;

/// Process exit code for the outcome of [`run_consultation`].
pub fn exit_code(result: &anyhow::Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) if e.is::<Interrupted>() => 130,
        Err(_) => 1,
    }
}

/// Run the full consultation flow until the user quits or the session is terminated.
///
/// Prompts and the Enter key are read on threads that may still be blocked
/// when this returns, so callers should exit the process right after.
pub async fn run_consultation(config: &Config) -> anyhow::Result<()> {
    // Fails with MissingCredential before any device or socket is touched.
    config.api_key()?;

    let controller = SessionController::new(
        Arc::new(GeminiLiveVendor::from_config(config)?),
        Arc::new(CpalBackend),
        CallSettings::from_config(config),
    );
    let generator = ProposalGenerator::new(
        Arc::new(GeminiTextClient::from_config(config)?),
        config.branding.clone(),
        config.generation_timeout(),
    );

    let term = Term::stdout();
    term.write_line(&format!(
        "{}",
        style(format!("{} | {}", config.branding.company, config.branding.persona)).bold()
    ))?;

    let mut screen = Screen::default();
    loop {
        let event = match &screen {
            Screen::Form(form) => {
                if let Some(notice) = form.notice() {
                    term.write_line(&format!("{}", style(notice).red()))?;
                }
                match or_interrupt(blocking(prompt_contact)).await? {
                    Some(contact) => ScreenEvent::Submit(contact),
                    None => continue,
                }
            }
            Screen::Consultation(s) => {
                consult(&controller, s.contact(), &config.branding.persona, &term).await?
            }
            Screen::ProposalGeneration(s) => {
                let document =
                    or_interrupt(async { Ok(generator.generate(s.contact(), s.transcript()).await) })
                        .await?;
                ScreenEvent::GenerationFinished(document)
            }
            Screen::ProposalView(s) => {
                term.write_line(&proposal_view(s.document()))?;
                match or_interrupt(blocking(prompt_view_action)).await? {
                    ViewAction::SaveText => {
                        let path = config.export_path();
                        match export::save_text(s.document(), &path) {
                            Ok(()) => term.write_line(&format!("Saved to {}", path.display()))?,
                            Err(e) => term.write_line(&format!(
                                "{}",
                                style(format!("Could not save: {e:#}")).red()
                            ))?,
                        }
                        continue;
                    }
                    ViewAction::Print => {
                        term.write_line(&export::render_for_print(
                            s.document(),
                            &config.branding,
                            Some(s.contact()),
                        ))?;
                        continue;
                    }
                    ViewAction::BackToHome => ScreenEvent::Reset,
                    ViewAction::Quit => return Ok(()),
                }
            }
            Screen::Terminated(_) => {
                term.write_line(&format!("{}", style(phase_banner(AppPhase::Terminated)).red().bold()))?;
                return Ok(());
            }
        };

        let phase = screen.apply(event)?;
        tracing::debug!(%phase, "Screen changed");
        if phase != AppPhase::Terminated {
            term.write_line(&format!("\n{}", style(phase_banner(phase)).bold()))?;
        }
    }
}

/// Await `fut` unless Ctrl-C arrives first.
async fn or_interrupt<T>(fut: impl Future<Output = anyhow::Result<T>>) -> anyhow::Result<T> {
    tokio::select! {
        result = fut => result,
        _ = tokio::signal::ctrl_c() => Err(Interrupted.into()),
    }
}

async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("prompt task failed")?
}

/// Ask for the intake fields. `None` when the user declines to start the call.
fn prompt_contact() -> anyhow::Result<Option<ContactRecord>> {
    let theme = ColorfulTheme::default();
    loop {
        let name: String = Input::with_theme(&theme)
            .with_prompt("Full name")
            .interact_text()?;
        let email: String = Input::with_theme(&theme)
            .with_prompt("Email")
            .allow_empty(true)
            .interact_text()?;
        let phone: String = Input::with_theme(&theme)
            .with_prompt("Phone")
            .allow_empty(true)
            .interact_text()?;
        let company: String = Input::with_theme(&theme)
            .with_prompt("Company")
            .interact_text()?;
        let labels = interest_labels();
        let interest = FuzzySelect::with_theme(&theme)
            .with_prompt("Area of interest")
            .items(&labels)
            .default(Interest::default().index())
            .interact()?;

        let form = IntakeForm {
            name,
            email,
            phone,
            company,
            interest: Interest::ALL.get(interest).copied(),
        };
        match form.submit() {
            Ok(contact) => {
                let start = Confirm::with_theme(&theme)
                    .with_prompt("Start the voice consultation now? (microphone required)")
                    .default(true)
                    .interact()?;
                return Ok(start.then_some(contact));
            }
            Err(e) => eprintln!("{}", style(e).red()),
        }
    }
}

fn prompt_view_action() -> anyhow::Result<ViewAction> {
    let labels: Vec<_> = ViewAction::ALL.iter().map(|a| a.label()).collect();
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("What next?")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(ViewAction::ALL.get(choice).copied().unwrap_or(ViewAction::Quit))
}

/// How often new transcript lines are printed during a call.
const TRANSCRIPT_REFRESH: Duration = Duration::from_millis(250);

/// Resolves once one line has been read from the input `open` returns.
///
/// The read runs on a detached thread that is never joined: a blocking read
/// cannot be cancelled, and it must not keep the runtime from shutting down.
fn line_entered<R, F>(open: F) -> anyhow::Result<oneshot::Receiver<std::io::Result<()>>>
where
    F: FnOnce() -> R + Send + 'static,
    R: BufRead,
{
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("enter-key".into())
        .spawn(move || {
            let mut line = String::new();
            let _ = tx.send(open().read_line(&mut line).map(|_| ()));
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}

/// Run one call until the user presses Enter or the assistant terminates it.
async fn consult(
    controller: &SessionController,
    contact: &ContactRecord,
    persona: &str,
    term: &Term,
) -> anyhow::Result<ScreenEvent> {
    let mut status = controller.subscribe();
    let mut call = match controller.start_call(contact).await {
        Ok(call) => call,
        Err(e) if e.reverts_to_intake() => return Ok(ScreenEvent::CallFailed(e.to_string())),
        Err(e) => return Err(e.into()),
    };

    let mut enter = line_entered(|| std::io::stdin().lock())?;
    let mut ended_early = false;
    let mut shown = 0;
    let mut refresh = tokio::time::interval(TRANSCRIPT_REFRESH);
    term.write_str(&status_line(&status.borrow_and_update()))?;

    loop {
        tokio::select! {
            read = &mut enter => {
                // A dropped sender means the reader thread died; treat it like EOF.
                if let Ok(read) = read {
                    read.context("reading stdin")?;
                }
                break;
            }
            outcome = call.wait(), if !ended_early => {
                if outcome.reason == EndReason::Terminated {
                    term.clear_line()?;
                    return Ok(ScreenEvent::AbuseDetected);
                }
                if let Some(notice) = end_notice(&outcome.reason) {
                    term.clear_line()?;
                    term.write_line(&format!("{}", style(notice).yellow()))?;
                }
                ended_early = true;
            }
            _ = refresh.tick() => {
                let transcript = call.transcript();
                let fresh = transcript.utterances().get(shown..).unwrap_or_default();
                if !fresh.is_empty() {
                    term.clear_line()?;
                    for utterance in fresh {
                        term.write_line(&transcript_line(utterance, persona))?;
                    }
                    shown = transcript.len();
                    term.write_str(&status_line(&status.borrow()))?;
                }
            }
            changed = status.changed() => {
                if changed.is_ok() {
                    term.clear_line()?;
                    term.write_str(&status_line(&status.borrow_and_update()))?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let (outcome, _) = call.end().await;
                tracing::info!(reason = ?outcome.reason, "Call interrupted by user");
                return Err(Interrupted.into());
            }
        }
    }

    term.clear_line()?;
    let (outcome, transcript) = call.end().await;
    if outcome.reason == EndReason::Terminated {
        return Ok(ScreenEvent::AbuseDetected);
    }
    term.write_line(&format!("Call ended after {} utterances.", transcript.len()))?;
    Ok(ScreenEvent::Generate(transcript))
}

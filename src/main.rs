use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sales_consult::config::{self, Config};
use sales_consult::intake::{IntakeForm, Interest};
use sales_consult::proposal::{export, DocumentOrigin, ProposalDocument, ProposalGenerator};
use sales_consult::transcript::Transcript;
use sales_consult::ui::terminal;
use sales_consult::voice::GeminiTextClient;

/// Voice sales consultations with generated business proposals.
#[derive(Parser, Debug)]
#[command(name = "sales-consult", version, about)]
struct Cli {
    /// Config file (default: ~/.sales-consult/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive intake, voice call and proposal (default)
    Consult,

    /// Generate a proposal from a saved transcript, without a call
    Generate {
        /// JSON array of {"role": "user"|"assistant", "text": ...}
        #[arg(long)]
        transcript: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        company: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        /// One of the intake interests, e.g. "Cloud Solutions"
        #[arg(long)]
        interest: Option<String>,
        /// Write the document here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Render a Markdown proposal in print layout
    Render {
        file: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the JSON schema of the config file
    Schema,
    /// Print the resolved configuration (credential redacted)
    Show,
}

fn init_logging(config: &Config, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { config.logging.level.as_str() };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    init_logging(&config, cli.verbose);

    match cli.command.unwrap_or(Command::Consult) {
        Command::Consult => {
            let result = sales_consult::ui::run_consultation(&config).await;
            let code = terminal::exit_code(&result);
            match &result {
                Err(e) if code == 130 => tracing::info!(error = %e, "Consultation stopped"),
                Err(e) => eprintln!("Error: {e:?}"),
                Ok(()) => {}
            }
            let _ = console::Term::stdout().show_cursor();
            // A prompt or stdin read may still be blocked; do not wait for it.
            std::process::exit(code);
        }
        Command::Generate {
            transcript,
            name,
            company,
            email,
            phone,
            interest,
            out,
        } => {
            let raw = std::fs::read_to_string(&transcript)
                .with_context(|| format!("reading {}", transcript.display()))?;
            let transcript: Transcript = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", transcript.display()))?;
            let contact = IntakeForm {
                name,
                email,
                phone,
                company,
                interest: interest.as_deref().map(Interest::from_label),
            }
            .submit()?;

            let generator = ProposalGenerator::new(
                Arc::new(GeminiTextClient::from_config(&config)?),
                config.branding.clone(),
                config.generation_timeout(),
            );
            let document = generator.generate(&contact, &transcript).await;
            match out {
                Some(path) => export::save_text(&document, &path)?,
                None => println!("{}", document.cleaned()),
            }
            if document.is_fallback() {
                anyhow::bail!("proposal generation did not succeed");
            }
            Ok(())
        }
        Command::Render { file, out } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let document = ProposalDocument::new(text, DocumentOrigin::Vendor);
            let printed = export::render_for_print(&document, &config.branding, None);
            match out {
                Some(path) => std::fs::write(&path, printed)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{printed}"),
            }
            Ok(())
        }
        Command::Config { action } => {
            match action {
                ConfigAction::Schema => println!("{}", Config::json_schema()?),
                ConfigAction::Show => {
                    let mut shown = config.clone();
                    if shown.vendor.api_key.is_some() {
                        shown.vendor.api_key = Some("********".into());
                    }
                    print!("{}", toml::to_string_pretty(&shown)?);
                }
            }
            Ok(())
        }
    }
}

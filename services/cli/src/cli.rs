use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use dpae_edi::config::{AppConfig, AppEnvironment};
use dpae_edi::error::AppError;
use dpae_edi::telemetry;
use dpae_edi::workflows::dpae::{
    DeclarationClient, DeclarationSession, ErrorKind, PollOutcome, SubmissionMode,
};
use tracing::info;

use crate::input::load_declaration;

#[derive(Parser, Debug)]
#[command(
    name = "dpae-cli",
    about = "Submit a pre-hire declaration (DPAE) and wait for its compliance certificate",
    version
)]
pub struct Cli {
    /// Declaration input file (JSON)
    pub input: PathBuf,
    /// Also print the document that was transmitted
    #[arg(short = 'v', long = "show-document")]
    pub show_document: bool,
    /// Send a real declaration instead of a test one
    #[arg(long)]
    pub production: bool,
    /// Override the configured log filter (e.g. `debug`, `dpae_edi=trace`)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// How the declaration ended, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Certified,
    Rejected,
    TimedOut,
}

impl Completion {
    pub fn exit_code(self) -> i32 {
        match self {
            Completion::Certified => 0,
            Completion::Rejected => 2,
            Completion::TimedOut => 3,
        }
    }
}

impl From<&PollOutcome> for Completion {
    fn from(outcome: &PollOutcome) -> Self {
        match outcome {
            PollOutcome::Certified(_) => Completion::Certified,
            PollOutcome::Rejected(_) => Completion::Rejected,
            PollOutcome::TimedOut { .. } => Completion::TimedOut,
        }
    }
}

pub fn run(cli: Cli) -> Result<Completion, AppError> {
    let mut config = AppConfig::load()?;
    if let Some(level) = cli.log_level.clone() {
        config.telemetry.log_level = level;
    }
    telemetry::init(&config.telemetry)?;

    let mut session = load_declaration(&cli.input)?;
    session.mode = submission_mode(cli.production, config.environment, session.mode);
    info!(
        input = %cli.input.display(),
        environment = ?config.environment,
        mode = session.mode.code(),
        "submitting declaration"
    );

    let client = DeclarationClient::from_config(&config)?;
    let outcome = client.submit(&mut session);

    // The transmitted document is shown even when polling failed.
    let stdout = io::stdout();
    write_report(&mut stdout.lock(), &session, cli.show_document)?;

    let outcome = outcome?;
    Ok(Completion::from(&outcome))
}

/// The `--production` flag or a production deployment upgrades a test
/// declaration; nothing downgrades one the input file marks as real.
pub fn submission_mode(
    production_flag: bool,
    environment: AppEnvironment,
    requested: SubmissionMode,
) -> SubmissionMode {
    if production_flag || environment.default_submission_mode() == SubmissionMode::Production {
        SubmissionMode::Production
    } else {
        requested
    }
}

/// Exit code for a run that ended in error: a rejection or timeout surfaced
/// as an error keeps its dedicated code.
pub fn failure_exit_code(err: &AppError) -> i32 {
    match err.declaration_kind() {
        Some(ErrorKind::NonConformity) => Completion::Rejected.exit_code(),
        Some(ErrorKind::Timeout) => Completion::TimedOut.exit_code(),
        _ => 1,
    }
}

/// One line `flow_id certificate rejection`, absent values shown as `-`.
pub fn write_report<W: Write>(
    out: &mut W,
    session: &DeclarationSession,
    show_document: bool,
) -> io::Result<()> {
    if show_document {
        if let Some(document) = session.transmitted_document.as_deref() {
            writeln!(out, "{document}")?;
        }
    }
    writeln!(
        out,
        "{} {} {}",
        session.flow_id().unwrap_or("-"),
        session.certificate().unwrap_or("-"),
        session.rejection().unwrap_or("-")
    )
}

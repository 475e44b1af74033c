//! model_probe - which models can this access key call?
//!
//! Sends one tiny chat completion per configured model to the DP Tech
//! OpenAPI endpoint, prints a line per model as results come in, then a
//! grouped summary, a ready-to-paste `SYSTEM_MODELS` value and a verdict
//! on the access key itself.
//!
//! Configuration (environment or `.env`):
//!     DPTECH_ACCESS_KEY    access key, sent in the `accessKey` header (required)
//!     DPTECH_BASE_URL      defaults to https://openapi.dp.tech/openapi/v1
//!     DPTECH_MODELS        comma-separated model ids (defaults to a built-in list)
//!     DPTECH_TIMEOUT_SECS  per-request timeout, default 30
//!     DPTECH_MAX_TOKENS    completion cap per probe, default 10
//!
//! Usage:
//!     cargo run -p model_probe

use anyhow::{Context, Result};
use colored::Colorize;
use model_probe::report;
use model_probe::{HttpTransport, ProbeConfig, ProbeEvent, Prober, RunSummary, Transport};
use std::future::Future;
use std::io::{self, Write};
use std::process::ExitCode;

/// How a run ended, mapped onto the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Completed,
    Failed,
    Interrupted,
}

impl RunOutcome {
    fn exit_code(self) -> ExitCode {
        match self {
            RunOutcome::Completed => ExitCode::SUCCESS,
            RunOutcome::Failed => ExitCode::FAILURE,
            RunOutcome::Interrupted => ExitCode::from(130),
        }
    }
}

/// Probe every model, then write the grouped report and verdict to `out`
///
/// Write errors (e.g. a closed pipe) abort the run instead of panicking.
async fn probe_and_report<T: Transport>(
    config: &ProbeConfig,
    prober: &Prober<T>,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "{}", report::intro(config))?;

    let mut write_error: Option<io::Error> = None;
    let results = prober
        .run(&config.models, |event| {
            if write_error.is_some() {
                return;
            }
            let written = match event {
                ProbeEvent::Started { index, total, model } => {
                    write!(out, "{}", report::progress_prefix(index, total, model))
                        .and_then(|_| out.flush())
                }
                ProbeEvent::Finished { result, .. } => {
                    writeln!(out, "{}", report::progress_marker(result))
                }
            };
            if let Err(e) = written {
                write_error = Some(e);
            }
        })
        .await;
    if let Some(e) = write_error {
        return Err(e).context("Failed to write progress");
    }

    let summary = RunSummary::from_results(&results);
    writeln!(out, "{}", report::render_summary(&summary)?)?;
    writeln!(out, "{}", report::render_totals(&summary))?;
    writeln!(out, "{}", report::render_verdict(summary.verdict()))?;
    out.flush()?;

    Ok(())
}

async fn run(out: &mut impl Write) -> Result<()> {
    let config = ProbeConfig::from_env()?;
    let transport = HttpTransport::new(&config).context("Failed to build HTTP client")?;
    let prober = Prober::new(transport, config.max_tokens);
    probe_and_report(&config, &prober, out).await
}

/// Race the run against an interrupt; report failures instead of crashing
async fn supervise<R, I>(run: R, interrupt: I) -> RunOutcome
where
    R: Future<Output = Result<()>>,
    I: Future<Output = io::Result<()>>,
{
    tokio::select! {
        result = run => match result {
            Ok(()) => RunOutcome::Completed,
            Err(e) => {
                eprintln!("\n\n{}: {:?}", "Probe run failed".bright_red(), e);
                RunOutcome::Failed
            }
        },
        Ok(()) = interrupt => {
            let _ = writeln!(io::stdout(), "\n\n{}", "Probe run interrupted".bright_yellow());
            RunOutcome::Interrupted
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    supervise(run(&mut stdout), tokio::signal::ctrl_c())
        .await
        .exit_code()
}

//! `vsphere-iso` command line.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vsphere_iso::builder::Builder;
use vsphere_iso::cancellation::CancellationToken;
use vsphere_iso::config::BuildConfig;
use vsphere_iso::driver::{SimulatedConnector, SimulatedDriver};
use vsphere_iso::errors::BuildError;
use vsphere_iso::events::LoggingEventSink;
use vsphere_iso::observability::{init_tracing, LogFormat};
use vsphere_iso::provision;
use vsphere_iso::ui::{ConsoleUi, Ui};

const BUILD_NAME: &str = "vsphere-iso";
const FORCED_EXIT_CODE: i32 = 130;

#[derive(Debug, Parser)]
#[command(name = "vsphere-iso", version, about = "Build vSphere VMs from an ISO")]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check a build definition without running it.
    Validate {
        /// Path to the JSON build definition.
        config: PathBuf,
    },
    /// Run a build.
    Build {
        /// Path to the JSON build definition.
        config: PathBuf,
        /// Run against an in-process simulated vCenter.
        #[arg(long)]
        dry_run: bool,
    },
}

fn load(path: &Path) -> anyhow::Result<Builder> {
    let config = BuildConfig::from_file(path)
        .with_context(|| format!("reading build definition {}", path.display()))?;
    let builder = Builder::prepare(config).map_err(BuildError::from)?;
    Ok(builder)
}

/// What an operator interrupt does at this point in the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Start cooperative cancellation; compensation still runs.
    Cancel,
    /// Give up on compensation and leave immediately.
    ForceExit,
}

fn classify_interrupt(token: &CancellationToken) -> Interrupt {
    if token.is_cancelled() {
        Interrupt::ForceExit
    } else {
        Interrupt::Cancel
    }
}

/// Cancels on the first Ctrl-C and exits on the next one, for when a
/// remote call never returns.
async fn watch_interrupts(token: Arc<CancellationToken>) {
    while tokio::signal::ctrl_c().await.is_ok() {
        match classify_interrupt(&token) {
            Interrupt::Cancel => {
                warn!("interrupt received, cancelling build; interrupt again to exit without cleanup");
                token.cancel("Interrupted by operator");
            }
            Interrupt::ForceExit => {
                error!("second interrupt received, exiting without cleanup");
                std::process::exit(FORCED_EXIT_CODE);
            }
        }
    }
}

async fn build(path: &Path, dry_run: bool, ui: Arc<dyn Ui>) -> anyhow::Result<()> {
    let builder = load(path)?;
    if !dry_run {
        bail!("no vSphere SDK binding is compiled into this binary; rerun with --dry-run");
    }

    let token = builder.cancellation();
    token.on_cancel(|| info!("cleaning up completed steps before exit"));
    tokio::spawn(watch_interrupts(token));

    let sim = Arc::new(SimulatedDriver::new());
    let connector = Arc::new(SimulatedConnector::new(sim.clone()));
    let provisioners = provision::from_configs(&builder.config().provisioners);
    let builder = builder.with_event_sink(Arc::new(LoggingEventSink::debug()));

    let (result, report) = builder.run_with_report(ui.clone(), connector, provisioners).await;
    debug!(calls = ?sim.operations(), "simulated driver journal");
    info!(report = %serde_json::to_string(&report)?, "run report");

    let artifact = result?;
    ui.say(&format!(
        "Build finished. The artifact of the build is:\n--> {BUILD_NAME}: {artifact}"
    ));
    println!("{}", serde_json::to_string_pretty(&artifact.summary())?);
    Ok(())
}

async fn execute(cli: Cli, ui: Arc<dyn Ui>) -> anyhow::Result<()> {
    match cli.command {
        Command::Validate { config } => {
            load(&config)?;
            ui.say("The configuration is valid.");
            Ok(())
        }
        Command::Build { config, dry_run } => build(&config, dry_run, ui).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    let ui: Arc<dyn Ui> = Arc::new(ConsoleUi::new(BUILD_NAME));

    match execute(cli, ui.clone()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.downcast_ref::<BuildError>().map_or(1, BuildError::exit_code);
            ui.error(&format!("Build '{BUILD_NAME}' errored: {err:#}"));
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

//! `vdisplay` command-line tool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, RecvTimeoutError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vdisplay_engine::Emulator;
use vdisplay_model::{EngineFile, Scenario};
use vdisplay_runner::{send, unescape, InboxStart, ScenarioRunner, Service};

#[derive(Parser)]
#[command(name = "vdisplay")]
#[command(about = "Virtual POS customer display emulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Engine configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the emulator, feeding it from the message inbox
    Run {
        /// Seconds between monitoring reports (0 disables them)
        #[arg(long, default_value_t = 5)]
        monitor_secs: u64,
        /// Replay messages already in the inbox
        #[arg(long)]
        replay: bool,
        /// Serve Prometheus metrics on this address
        #[cfg(feature = "prometheus")]
        #[arg(long)]
        metrics_addr: Option<std::net::SocketAddr>,
    },
    /// Append a message to the inbox
    Send {
        /// Target port, e.g. COM1
        port: String,
        /// Payload; \e, \x1b, \f, \a and \\ escapes are expanded
        message: String,
        /// Inbox file (defaults to the configured one)
        #[arg(long)]
        inbox: Option<PathBuf>,
    },
    /// Run a test scenario and print the report as JSON
    Scenario {
        /// Scenario file (YAML)
        path: PathBuf,
        /// Skip the per-step delays
        #[arg(long)]
        no_delay: bool,
    },
    /// List the available display profiles
    Profiles,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    vdisplay_metrics::describe_metrics();

    let file = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            monitor_secs,
            replay,
            #[cfg(feature = "prometheus")]
            metrics_addr,
        } => {
            #[cfg(feature = "prometheus")]
            if let Some(addr) = metrics_addr {
                vdisplay_metrics::install_prometheus_exporter(addr)
                    .context("failed to start Prometheus exporter")?;
                info!(%addr, "serving metrics");
            }
            run(&file, monitor_secs, replay)
        }
        Commands::Send { port, message, inbox } => {
            let path = inbox.unwrap_or_else(|| file.inbox.clone());
            send(&path, &port, &unescape(&message))
                .with_context(|| format!("failed to send to {}", path.display()))?;
            Ok(())
        }
        Commands::Scenario { path, no_delay } => run_scenario(&file, &path, !no_delay),
        Commands::Profiles => {
            let library = file.profile_library()?;
            let profiles: Vec<_> = library.iter().collect();
            println!("{}", serde_json::to_string_pretty(&profiles)?);
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<EngineFile> {
    match path {
        Some(path) => EngineFile::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineFile::default()),
    }
}

fn run(file: &EngineFile, monitor_secs: u64, replay: bool) -> Result<()> {
    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("failed to install Ctrl-C handler")?;

    let start = if replay { InboxStart::Beginning } else { InboxStart::End };
    let service = Service::start(file, start)?;
    info!(inbox = %file.inbox.display(), "waiting for messages, Ctrl-C to stop");

    if monitor_secs == 0 {
        let _ = stop_rx.recv();
    } else {
        let interval = Duration::from_secs(monitor_secs);
        loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    println!("{}", serde_json::to_string(&service.report())?);
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    info!("shutting down");
    let report = service.shutdown();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_scenario(file: &EngineFile, path: &Path, delays: bool) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let library = file.profile_library()?;
    let emulator = Emulator::new(file.emulator_config())?;

    let report = ScenarioRunner::new(&emulator, &library)
        .with_delays(delays)
        .run(&scenario)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.passed {
        for failure in report.failures() {
            warn!(step = failure.step, port = %failure.port, "failed");
        }
        bail!("scenario '{}' failed ({:.1}% passed)", report.name, report.pass_rate);
    }
    Ok(())
}

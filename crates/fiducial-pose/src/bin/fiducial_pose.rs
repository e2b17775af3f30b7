use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fiducial_pose::session::{replay, Session};
use fiducial_pose::NodeConfig;

#[cfg(not(feature = "tracing"))]
use log::LevelFilter;

/// Replay a recorded marker session through the pose pipeline.
#[derive(Debug, Parser)]
#[command(name = "fiducial-pose", version, about)]
struct Cli {
    /// Node configuration (JSON).
    #[arg(long)]
    config: PathBuf,
    /// Recorded session (JSON).
    #[arg(long)]
    session: PathBuf,
    /// Report path; printed to stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Log at debug level.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    #[cfg(not(feature = "tracing"))]
    {
        let default = if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        let level = fiducial_pose::core::level_from_env(default);
        if let Err(err) = fiducial_pose::core::init_with_level(level) {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    }

    #[cfg(feature = "tracing")]
    {
        fiducial_pose::core::init_tracing(false);
        // Bridge `log` records; a no-op if the subscriber already did.
        let _ = tracing_log::LogTracer::init();
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "info"))]
fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = NodeConfig::load_json(&cli.config)?;
    let session = Session::load_json(&cli.session)?;
    log::info!("replaying {} frames", session.frames.len());

    let report = replay(&config, &session)?;
    let published: usize = report.messages.len();
    log::info!("published {} messages", published);

    match &cli.output {
        Some(path) => {
            report.write_json(path)?;
            log::info!("report written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

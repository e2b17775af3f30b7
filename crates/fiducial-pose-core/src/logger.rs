//! Logging setup for the node and the replay tool.
//!
//! [`init_with_level`] installs a stderr backend for the `log` facade. Lines
//! read `[   1.234s WARN  fiducial_pose::node] message`. Records from this
//! workspace pass at the requested level; records from other crates are
//! capped at `Warn`. With the `tracing` feature, [`init_tracing`] installs a
//! `tracing-subscriber` instead, filtered by [`LOG_ENV`].
//!
//! Both write to stderr; stdout is reserved for reports.

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log level (or, with `tracing`, filter directives).
pub const LOG_ENV: &str = "FIDUCIAL_POSE_LOG";

/// Module-path prefix shared by every crate of this workspace.
const OWN_TARGET_PREFIX: &str = "fiducial_pose";

#[cfg(feature = "tracing")]
const DEFAULT_TRACING_DIRECTIVES: &str = "warn,fiducial_pose=info,fiducial_pose_core=info";

struct StderrSink {
    own: LevelFilter,
    foreign: LevelFilter,
    origin: Instant,
}

impl StderrSink {
    fn new(level: LevelFilter) -> Self {
        Self {
            own: level,
            foreign: level.min(LevelFilter::Warn),
            origin: Instant::now(),
        }
    }

    fn threshold(&self, target: &str) -> LevelFilter {
        if target.starts_with(OWN_TARGET_PREFIX) {
            self.own
        } else {
            self.foreign
        }
    }
}

fn render(elapsed: Duration, level: Level, target: &str, args: &fmt::Arguments<'_>) -> String {
    format!(
        "[{:8.3}s {:<5} {}] {}",
        elapsed.as_secs_f64(),
        level,
        target,
        args
    )
}

impl Log for StderrSink {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.threshold(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = render(
            self.origin.elapsed(),
            record.level(),
            record.target(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static SINK: OnceLock<StderrSink> = OnceLock::new();

/// Install the stderr backend. Later calls keep the first installation.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if SINK.get().is_some() {
        return Ok(());
    }
    log::set_logger(SINK.get_or_init(|| StderrSink::new(level)))?;
    log::set_max_level(level);
    Ok(())
}

fn parse_level(raw: Option<&str>, default: LevelFilter) -> LevelFilter {
    raw.and_then(|s| LevelFilter::from_str(s.trim()).ok())
        .unwrap_or(default)
}

/// Level named by [`LOG_ENV`], or `default` when unset or unparsable.
pub fn level_from_env(default: LevelFilter) -> LevelFilter {
    parse_level(std::env::var(LOG_ENV).ok().as_deref(), default)
}

/// Install a `tracing` subscriber on stderr, as plain text with uptime stamps or as JSON.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TRACING_DIRECTIVES));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(tracing_subscriber::fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}

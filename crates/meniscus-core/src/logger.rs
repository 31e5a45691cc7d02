//! Logging setup for binaries and examples.
//!
//! Library code only uses the `log` macros. `init_with_level` installs a
//! stderr logger printing `[elapsed LEVEL module] message`; records from
//! crates outside the workspace are shown from `warn` up only.
//! With the `tracing` feature, `init_tracing` installs a `tracing-subscriber`
//! filtered by `MENISCUS_LOG`, then `RUST_LOG`, then [`DEFAULT_FILTER`].

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when neither `MENISCUS_LOG` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str =
    "warn,meniscus=info,meniscus_core=info,meniscus_level=info,meniscus_track=info";

const OWN_PREFIX: &str = "meniscus";

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

/// Workspace records pass at `level`, foreign ones at `warn` at most.
fn passes(target: &str, record_level: Level, level: LevelFilter) -> bool {
    let limit = if target.starts_with(OWN_PREFIX) {
        level
    } else {
        level.min(LevelFilter::Warn)
    };
    record_level <= limit
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        passes(metadata.target(), metadata.level(), self.level)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:8.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            short_target(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// `meniscus_level::finder::pipeline` -> `pipeline`
fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger. Later calls are no-ops.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

#[cfg(feature = "tracing")]
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("MENISCUS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a `tracing` subscriber; spans are reported when they close.
///
/// `json = true` writes one flattened JSON object per event, including the
/// enclosing span list.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let builder = fmt()
        .with_env_filter(env_filter())
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    if json {
        let _ = builder
            .json()
            .flatten_event(true)
            .with_span_list(true)
            .finish()
            .try_init();
    } else {
        let _ = builder
            .with_timer(fmt::time::Uptime::default())
            .with_target(true)
            .finish()
            .try_init();
    }
}

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

/// Environment override for the stderr log level, e.g. `RENDERLINK_LOG=debug`.
pub const LOG_ENV: &str = "RENDERLINK_LOG";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// `RENDERLINK_LOG` beats the `--log-level` flag, so wrapper scripts and
/// host integrations can crank verbosity without editing the command line.
/// Unrecognized values fall back to the flag.
fn resolve_filter(flag: LogLevel) -> LevelFilter {
    match std::env::var(LOG_ENV) {
        Ok(value) => parse_level(&value).unwrap_or_else(|| flag.filter()),
        Err(_) => flag.filter(),
    }
}

fn parse_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::OFF),
        "error" => Some(LevelFilter::ERROR),
        "warn" => Some(LevelFilter::WARN),
        "info" => Some(LevelFilter::INFO),
        "debug" => Some(LevelFilter::DEBUG),
        "trace" => Some(LevelFilter::TRACE),
        _ => None,
    }
}

pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = resolve_filter(level);
    // Session, sender, receiver, and heartbeat threads all log; thread ids
    // make the interleaving readable at debug and below.
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(filter)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(filter >= LevelFilter::DEBUG);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

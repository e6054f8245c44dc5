use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Subcommand};
use renderlink_client::{BridgeBus, BridgeClient, ClientConfig, DEFAULT_PORT};

use crate::exit::{CliError, CliResult, CONNECT_ERROR, INTERNAL, TIMEOUT, USAGE};
use crate::output::OutputFormat;

pub mod opcodes;
pub mod ping;
pub mod prompt;
pub mod request;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one or more image files to the service.
    Send(SendArgs),
    /// Request named images and wait for them to come back.
    Request(RequestArgs),
    /// Ask the service to run its queued prompt.
    Prompt(PromptArgs),
    /// Connect, handshake, and report the round trip.
    Ping(PingArgs),
    /// List the wire opcodes.
    Opcodes(OpcodesArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Request(args) => request::run(args, format),
        Command::Prompt(args) => prompt::run(args, format),
        Command::Ping(args) => ping::run(args, format),
        Command::Opcodes(args) => opcodes::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Bridge server host.
    #[arg(long, default_value = "127.0.0.1", env = "RENDERLINK_HOST")]
    pub host: String,
    /// Bridge server port.
    #[arg(long, short = 'p', default_value_t = DEFAULT_PORT, env = "RENDERLINK_PORT")]
    pub port: u16,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Image files to send.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Image names to request.
    #[arg(required = true)]
    pub names: Vec<String>,
    /// Write received images into this directory.
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,
    /// Maximum time to wait for all images (e.g. 30s).
    #[arg(long, default_value = "30s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct PromptArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Stay connected and print progress until interrupted.
    #[arg(long)]
    pub watch: bool,
    /// Maximum time to watch for progress (e.g. 10m).
    #[arg(long, default_value = "10m")]
    pub watch_timeout: String,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug, Default)]
pub struct OpcodesArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Connect a client and block until the session is live or has failed.
pub fn connect_client(link: &LinkArgs, bus: Arc<BridgeBus>) -> CliResult<BridgeClient> {
    let timeout = parse_duration(&link.timeout)?;
    let config = ClientConfig {
        connect_timeout: Some(timeout),
        ..ClientConfig::default()
    };
    let client = BridgeClient::with_config(bus, config);
    client.connect(&link.host, link.port);

    let deadline = Instant::now() + timeout + Duration::from_secs(1);
    let mut attempt_seen = false;
    loop {
        let info = client.info();
        if info.is_connected {
            return Ok(client);
        }
        if info.is_connecting {
            attempt_seen = true;
        } else if attempt_seen {
            // The session thread came and went without reaching Connected.
            return Err(CliError::new(
                CONNECT_ERROR,
                format!("connection to {}:{} failed", link.host, link.port),
            ));
        }
        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("connection to {}:{} timed out", link.host, link.port),
            ));
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// Wait until everything the command enqueued is fully on the wire:
/// queue empty and no operation mid-write.
pub fn drain_ops(client: &BridgeClient, timeout: Duration) -> CliResult<()> {
    let deadline = Instant::now() + timeout;
    while !client.is_idle() {
        if !client.is_connected() {
            return Err(CliError::new(
                CONNECT_ERROR,
                "connection dropped before all operations were sent",
            ));
        }
        if Instant::now() >= deadline {
            return Err(CliError::new(TIMEOUT, "timed out draining operations"));
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    Ok(())
}

pub fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}

/// Parse the duration flags: a digit run plus an optional `ms`/`s`/`m`
/// unit, bare digits meaning seconds. Heartbeat-scale waits want `ms`,
/// render watches want minutes, so all three are accepted.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input:?}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "" | "s" => Ok(Duration::from_secs(value)),
        "ms" => Ok(Duration::from_millis(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        other => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {other:?}"),
        )),
    }
}

use std::sync::Arc;
use std::time::Instant;

use renderlink_client::BridgeBus;

use crate::cmd::{connect_client, PingArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_ping, OutputFormat, PingOutput};

pub fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    let bus = Arc::new(BridgeBus::new());
    let start = Instant::now();
    let client = connect_client(&args.link, bus)?;
    let elapsed = start.elapsed();
    client.disconnect();

    print_ping(
        &PingOutput {
            host: &args.link.host,
            port: args.link.port,
            connected: true,
            elapsed_ms: elapsed.as_millis(),
        },
        format,
    );
    Ok(SUCCESS)
}

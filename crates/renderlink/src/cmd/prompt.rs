use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use renderlink_bus::TICK_INTERVAL;
use renderlink_client::{BridgeBus, BridgeEvent, ON_PROGRESS};

use crate::cmd::{connect_client, drain_ops, install_ctrlc_handler, parse_duration, PromptArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_progress, OutputFormat};

pub fn run(args: PromptArgs, format: OutputFormat) -> CliResult<i32> {
    let watch_timeout = parse_duration(&args.watch_timeout)?;
    let bus = Arc::new(BridgeBus::new());

    if args.watch {
        bus.add(ON_PROGRESS, None, move |_, event| {
            if let BridgeEvent::Progress { progress, max } = event {
                print_progress(*progress, *max, format);
            }
        });
    }

    let client = connect_client(&args.link, Arc::clone(&bus))?;
    client.queue_prompt();
    drain_ops(&client, Duration::from_secs(10))?;

    if args.watch {
        let running = install_ctrlc_handler()?;
        let deadline = Instant::now() + watch_timeout;
        while running.load(Ordering::SeqCst)
            && client.is_connected()
            && Instant::now() < deadline
        {
            bus.dispatch();
            std::thread::sleep(TICK_INTERVAL);
        }
    }

    client.disconnect();
    Ok(SUCCESS)
}

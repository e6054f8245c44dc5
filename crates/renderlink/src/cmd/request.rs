use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::Bytes;
use renderlink_bus::TICK_INTERVAL;
use renderlink_client::{BridgeBus, BridgeEvent, ON_IMAGE_RECEIVED};

use crate::cmd::{connect_client, install_ctrlc_handler, parse_duration, RequestArgs};
use crate::exit::{io_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_image, OutputFormat};

pub fn run(args: RequestArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    if let Some(dir) = &args.out {
        fs::create_dir_all(dir)
            .map_err(|err| io_error(&format!("failed creating {}", dir.display()), err))?;
    }

    let bus = Arc::new(BridgeBus::new());
    let received: Arc<Mutex<Vec<(String, Bytes)>>> = Arc::default();
    let sink = Arc::clone(&received);
    bus.add(ON_IMAGE_RECEIVED, None, move |_, event| {
        if let BridgeEvent::ImageReceived { name, data } = event {
            sink.lock()
                .expect("received image list poisoned")
                .push((name.clone(), data.clone()));
        }
    });

    let client = connect_client(&args.link, Arc::clone(&bus))?;
    client.send_request_names(args.names.clone());

    let wanted: HashSet<&str> = args.names.iter().map(String::as_str).collect();
    let running = install_ctrlc_handler()?;
    let deadline = Instant::now() + wait_timeout;
    loop {
        bus.dispatch();
        {
            let got = received.lock().expect("received image list poisoned");
            let names: HashSet<&str> = got.iter().map(|(name, _)| name.as_str()).collect();
            if wanted.is_subset(&names) {
                break;
            }
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }
        if !client.is_connected() {
            client.disconnect();
            return Err(CliError::new(
                crate::exit::CONNECT_ERROR,
                "connection dropped while waiting for images",
            ));
        }
        if Instant::now() >= deadline {
            client.disconnect();
            return Err(CliError::new(TIMEOUT, "timed out waiting for images"));
        }
        std::thread::sleep(TICK_INTERVAL);
    }
    client.disconnect();

    let got = received.lock().expect("received image list poisoned");
    for (name, data) in got.iter() {
        let path = match &args.out {
            Some(dir) => {
                let path = image_path(dir, name);
                fs::write(&path, data)
                    .map_err(|err| io_error(&format!("failed writing {}", path.display()), err))?;
                Some(path)
            }
            None => None,
        };
        print_image(name, data.len(), path.as_deref(), format);
    }
    Ok(SUCCESS)
}

fn image_path(dir: &PathBuf, name: &str) -> PathBuf {
    // Image names come off the wire; keep only the final path component.
    let safe = name.rsplit(['/', '\\']).next().unwrap_or(name);
    dir.join(safe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_path_drops_directory_components() {
        let dir = PathBuf::from("/tmp/out");
        assert_eq!(image_path(&dir, "beauty"), PathBuf::from("/tmp/out/beauty"));
        assert_eq!(
            image_path(&dir, "../../etc/passwd"),
            PathBuf::from("/tmp/out/passwd")
        );
    }
}

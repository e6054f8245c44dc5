use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use renderlink_client::BridgeBus;

use crate::cmd::{connect_client, drain_ops, SendArgs};
use crate::exit::{client_error, io_error, CliResult, SUCCESS};
use crate::output::{print_image, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let mut names = Vec::with_capacity(args.files.len());
    let mut blobs = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let data = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        names.push(image_name(path));
        blobs.push(Bytes::from(data));
    }

    let bus = Arc::new(BridgeBus::new());
    let client = connect_client(&args.link, bus)?;

    let sizes: Vec<usize> = blobs.iter().map(|b| b.len()).collect();
    client
        .send_images(names.clone(), blobs)
        .map_err(|err| client_error("send failed", err))?;
    drain_ops(&client, Duration::from_secs(60))?;
    client.disconnect();

    for (name, size) in names.iter().zip(sizes) {
        print_image(name, size, None, format);
    }
    Ok(SUCCESS)
}

fn image_name(path: &Path) -> String {
    path.file_stem()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

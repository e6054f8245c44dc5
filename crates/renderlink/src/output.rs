use std::io::IsTerminal;
use std::path::Path;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ImageOutput<'a> {
    name: &'a str,
    size: usize,
    path: Option<String>,
}

pub fn print_image(name: &str, size: usize, path: Option<&Path>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ImageOutput {
                name,
                size,
                path: path.map(|p| p.display().to_string()),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["NAME", "SIZE", "PATH"]);
            table.add_row(vec![
                name.to_string(),
                size.to_string(),
                path.map(|p| p.display().to_string()).unwrap_or_default(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match path {
            Some(path) => println!("image {name} ({size} bytes) -> {}", path.display()),
            None => println!("image {name} ({size} bytes)"),
        },
    }
}

#[derive(Serialize)]
struct ProgressOutput {
    progress: u32,
    max: u32,
}

pub fn print_progress(progress: u32, max: u32, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ProgressOutput { progress, max }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("progress {progress}/{max}");
        }
    }
}

#[derive(Serialize)]
pub struct OpcodeRow {
    pub code: u32,
    pub name: &'static str,
    pub direction: &'static str,
}

pub fn print_opcodes(rows: &[OpcodeRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = new_table(vec!["CODE", "NAME", "DIRECTION"]);
            for row in rows {
                table.add_row(vec![
                    row.code.to_string(),
                    row.name.to_string(),
                    row.direction.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!("{:>4} {:<16} {}", row.code, row.name, row.direction);
            }
        }
    }
}

#[derive(Serialize)]
pub struct PingOutput<'a> {
    pub host: &'a str,
    pub port: u16,
    pub connected: bool,
    pub elapsed_ms: u128,
}

pub fn print_ping(out: &PingOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["HOST", "PORT", "CONNECTED", "ELAPSED"]);
            table.add_row(vec![
                out.host.to_string(),
                out.port.to_string(),
                out.connected.to_string(),
                format!("{}ms", out.elapsed_ms),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{}:{} connected={} elapsed={}ms",
                out.host, out.port, out.connected, out.elapsed_ms
            );
        }
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct BuildInfo {
    name: &'static str,
    version: &'static str,
    target_os: &'static str,
    target_arch: &'static str,
    build_target: &'static str,
    git_hash: &'static str,
}

fn build_info() -> BuildInfo {
    BuildInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        target_os: std::env::consts::OS,
        target_arch: std::env::consts::ARCH,
        build_target: option_env!("RENDERLINK_BUILD_TARGET").unwrap_or("unknown"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
    }
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let info = build_info();

    if !args.extended {
        match format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({ "name": info.name, "version": info.version })
            ),
            OutputFormat::Table | OutputFormat::Pretty => {
                println!("{} {}", info.name, info.version);
            }
        }
        return Ok(SUCCESS);
    }

    let fields = [
        ("name", info.name),
        ("version", info.version),
        ("target_os", info.target_os),
        ("target_arch", info.target_arch),
        ("build_target", info.build_target),
        ("git_hash", info.git_hash),
    ];
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&info).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in fields {
                table.add_row(vec![field, value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (field, value) in fields {
                println!("{field}: {value}");
            }
        }
    }
    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_info_reflects_the_package() {
        let info = build_info();
        assert_eq!(info.name, "renderlink");
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert!(!info.target_os.is_empty());
        assert!(!info.target_arch.is_empty());
    }
}

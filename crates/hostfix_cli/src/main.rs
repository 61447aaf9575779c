use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use hostfix_core::codec::UesaveCodec;
use hostfix_core::config::FixConfig;
use hostfix_core::container::{ContainerHeader, HEADER_LEN, SaveContainer};
use hostfix_core::fix::{self, FixReport, HostFix, SaveLayout};
use hostfix_core::guid::HostIdentity;
use serde_json::json;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Give the co-op host's character back to the host on a dedicated server save.
    Fix {
        /// Path to the uesave executable.
        #[arg(value_name = "UESAVE")]
        uesave: PathBuf,
        /// World save folder containing Level.sav and Players/.
        #[arg(value_name = "SAVE_DIR")]
        save_dir: PathBuf,
        /// The host's player id, e.g. 8E910AC2000000000000000000000000.
        #[arg(value_name = "HOST_GUID")]
        host_guid: String,
        /// JSON file overriding type hints, field paths or the scratch directory name.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Print the container header of a .sav file and check that it decodes.
    Inspect {
        #[arg(value_name = "FILE.sav")]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Fix {
            uesave,
            save_dir,
            host_guid,
            config,
        } => run_fix(&uesave, &save_dir, &host_guid, config.as_deref()),
        Command::Inspect { path, json } => run_inspect(&path, json),
    }
}

fn run_fix(uesave: &Path, save_dir: &Path, host_guid: &str, config_path: Option<&Path>) {
    let config = match config_path {
        Some(path) => {
            let text = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error reading {}: {e}", path.display());
                process::exit(1);
            });
            FixConfig::from_json_str(&text).unwrap_or_else(|e| {
                eprintln!("Error in config {}: {e}", path.display());
                process::exit(1);
            })
        }
        None => FixConfig::default(),
    };

    let host = HostIdentity::parse(host_guid).unwrap_or_else(|e| {
        eprintln!("Error in host guid: {e}");
        process::exit(1);
    });

    fix::validate_codec_path(uesave).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });
    let layout = SaveLayout::locate(save_dir, &host).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });

    let codec = UesaveCodec::new(uesave, layout.scratch_dir(&config));
    let host_fix = HostFix::new(codec, config).unwrap_or_else(|e| {
        eprintln!("Error in config: {e}");
        process::exit(1);
    });

    let report = host_fix
        .run(&layout, &host, |stage| println!("{stage}"))
        .unwrap_or_else(|e| {
            eprintln!("Error applying fix to {}:", layout.save_dir.display());
            eprintln!("  {e}");
            if e.code.is_container_error() {
                eprintln!("  (run `inspect` on the save files for header details)");
            }
            process::exit(1);
        });
    print_report(&report);
}

fn print_report(report: &FixReport) {
    let migration = &report.migration;
    println!("Host instance id: {}", migration.host_instance_id);
    match migration.world_entry_index {
        Some(index) => println!("Updated world character entry {index}"),
        None => println!(
            "Note: no character in {} has instance id {}; its owner was left unchanged",
            fix::LEVEL_SAVE_NAME,
            migration.host_instance_id
        ),
    }
    println!("Wrote host save to {}", report.output.display());
}

fn run_inspect(path: &Path, as_json: bool) {
    let bytes = fs::read(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", path.display());
        process::exit(1);
    });
    let header = ContainerHeader::parse(&bytes).unwrap_or_else(|e| {
        eprintln!("Error parsing save container: {}", path.display());
        eprintln!("  {e}");
        process::exit(1);
    });
    let decoded = SaveContainer::parse(&bytes).and_then(|c| c.decompress());
    let stored_length = bytes.len().saturating_sub(HEADER_LEN);

    if as_json {
        let mut out = json!({
            "save_type": format!("0x{:02x}", header.save_type.raw()),
            "compression": header.save_type.as_str(),
            "uncompressed_length": header.uncompressed_length,
            "compressed_length": header.compressed_length,
            "stored_length": stored_length,
        });
        match &decoded {
            Ok(raw) => out["decoded_length"] = json!(raw.len()),
            Err(e) => out["error"] = json!(e.to_string()),
        }
        let rendered = serde_json::to_string_pretty(&out).unwrap_or_else(|e| {
            eprintln!("Error rendering JSON output: {e}");
            process::exit(1);
        });
        println!("{rendered}");
    } else {
        println!("save_type=0x{:02x}", header.save_type.raw());
        println!("compression={}", header.save_type.as_str());
        println!("uncompressed_length={}", header.uncompressed_length);
        println!("compressed_length={}", header.compressed_length);
        println!("stored_length={stored_length}");
        if let Ok(raw) = &decoded {
            println!("decoded_length={}", raw.len());
        }
    }

    if let Err(e) = decoded {
        eprintln!("Error decoding {}: {e}", path.display());
        process::exit(1);
    }
}

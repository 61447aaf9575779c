use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde_json::Value;

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_palworld-host-fix"))
        .args(args)
        .output()
        .expect("failed to run palworld-host-fix CLI")
}

fn temp_output_path(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}_{}_{}.sav", std::process::id(), nanos))
}

fn hello_world_container(declared_compressed: Option<u32>) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(b"hello world")
        .expect("zlib encode should write content");
    let packed = encoder.finish().expect("zlib encode should finish");

    let mut out = Vec::new();
    out.extend_from_slice(&11u32.to_le_bytes());
    out.extend_from_slice(&declared_compressed.unwrap_or(packed.len() as u32).to_le_bytes());
    out.extend_from_slice(b"PlZ");
    out.push(0x31);
    out.extend_from_slice(&packed);
    out
}

#[test]
fn inspect_prints_header_fields() {
    let path = temp_output_path("inspect_ok");
    fs::write(&path, hello_world_container(None)).expect("failed to write container");
    let path_arg = path.to_string_lossy().to_string();

    let output = run_cli(&["inspect", &path_arg]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "save_type=0x31");
    assert_eq!(lines[1], "compression=zlib");
    assert_eq!(lines[2], "uncompressed_length=11");
    assert!(lines.contains(&"decoded_length=11"));

    let _ = fs::remove_file(&path);
}

#[test]
fn inspect_json_reports_decode_error() {
    let path = temp_output_path("inspect_bad_len");
    fs::write(&path, hello_world_container(Some(1))).expect("failed to write container");
    let path_arg = path.to_string_lossy().to_string();

    let output = run_cli(&["inspect", "--json", &path_arg]);
    assert!(!output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: Value = serde_json::from_str(&stdout).expect("stdout should be valid JSON");
    assert_eq!(json["save_type"], "0x31");
    assert_eq!(json["compressed_length"], 1);
    assert!(
        json["error"]
            .as_str()
            .expect("error should be a string")
            .starts_with("LengthMismatch")
    );

    let _ = fs::remove_file(&path);
}

#[test]
fn inspect_rejects_non_container() {
    let path = temp_output_path("inspect_not_sav");
    fs::write(&path, b"GVAS\0\0\0\0\0\0\0\0\0\0\0\0").expect("failed to write file");
    let path_arg = path.to_string_lossy().to_string();

    let output = run_cli(&["inspect", &path_arg]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("FormatMismatch"));

    let _ = fs::remove_file(&path);
}

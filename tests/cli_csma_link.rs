use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "tapsim-rs-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_config(dir: &PathBuf) -> PathBuf {
    let path = dir.join("emu.json");
    fs::write(
        &path,
        r#"{ "migrate_attempts": 400, "migrate_interval_ms": 5, "migrate_settle_ms": 0 }"#,
    )
    .expect("write config");
    path
}

fn field<'a>(stdout: &'a str, prefix: &str) -> Option<&'a str> {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix(prefix))
}

#[test]
fn csma_link_dry_run_delivers_a_frame() {
    let dir = unique_temp_dir("csma-link");
    let config = write_config(&dir);

    let output = Command::new(env!("CARGO_BIN_EXE_csma_link"))
        .args([
            "--dry-run",
            "--duration-ms",
            "300",
            "--data-rate",
            "10Mbps",
            "--delay",
            "2ms",
            "--config",
            config.to_str().unwrap(),
        ])
        .env("RUST_LOG", "warn")
        .output()
        .expect("run csma_link");
    assert!(
        output.status.success(),
        "csma_link failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let intf_lines: Vec<&str> = stdout.lines().filter(|l| l.starts_with("intf=")).collect();
    assert_eq!(intf_lines.len(), 2, "stdout={stdout}");
    for line in &intf_lines {
        assert!(line.contains("installed=true"), "{line}");
        assert!(line.contains("in_ns=true"), "{line}");
        assert!(line.contains("mode=UseLocal"), "{line}");
    }
    assert_eq!(field(&stdout, "dry_run_delivered="), Some("1"), "stdout={stdout}");

    let stats: Value =
        serde_json::from_str(field(&stdout, "stats=").expect("stats line")).expect("stats json");
    assert_eq!(stats["frames_from_taps"].as_u64(), Some(1));
    assert_eq!(stats["frames_to_taps"].as_u64(), Some(1));
}

#[test]
fn csma_link_rejects_a_bad_config_file() {
    let dir = unique_temp_dir("csma-link-bad");
    let path = dir.join("emu.json");
    fs::write(&path, "{ not json").expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_csma_link"))
        .args(["--dry-run", "--config", path.to_str().unwrap()])
        .output()
        .expect("run csma_link");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("csma_link:"), "stderr={stderr}");
}

#[test]
fn csma_link_rejects_a_bad_data_rate() {
    let output = Command::new(env!("CARGO_BIN_EXE_csma_link"))
        .args(["--dry-run", "--data-rate", "fast"])
        .output()
        .expect("run csma_link");
    assert!(!output.status.success());
}

//! End-to-end `depthbook replay` runs

use std::fs;
use std::process::Command;
use tempfile::TempDir;

const JOURNAL: &str = concat!(
    r#"{"type":"snapshot","timestamp":1700000000.0,"data":{"lastUpdateId":10,"bids":[["100.00000000","1.00000000"],["99.00000000","2.00000000"]],"asks":[["101.00000000","1.00000000"]]}}"#,
    "\n",
    r#"{"type":"diff","data":{"e":"depthUpdate","E":1,"s":"BTCUSDT","U":11,"u":11,"b":[["100.00000000","0.00000000"]],"a":[]}}"#,
    "\n",
    r#"{"type":"diff","data":{"e":"depthUpdate","E":2,"s":"BTCUSDT","U":12,"u":12,"b":[["98.00000000","4.00000000"]],"a":[]}}"#,
    "\n",
);

fn depthbook(args: &[&str]) -> Result<std::process::Output, std::io::Error> {
    Command::new(env!("CARGO_BIN_EXE_depthbook"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
}

#[test]
fn test_replay_prints_top_levels() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("btcusdt_diffs.jsonl");
    fs::write(&path, JOURNAL)?;
    let file = path.to_str().ok_or("non-utf8 temp path")?;

    let output = depthbook(&["replay", "--file", file, "--depth", "1"])?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Diff events applied: all"));
    assert!(stdout.contains(&format!("{:>15} | {:>15}", "99", "2")));
    assert!(!stdout.contains(&format!("{:>15} | {:>15}", "98", "4")));
    Ok(())
}

#[test]
fn test_replay_event_limit() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("btcusdt_diffs.jsonl");
    fs::write(&path, JOURNAL)?;
    let file = path.to_str().ok_or("non-utf8 temp path")?;

    let output = depthbook(&["replay", "--file", file, "--event-limit", "1"])?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Diff events applied: 1"));
    assert!(!stdout.contains(&format!("{:>15} | {:>15}", "98", "4")));
    Ok(())
}

#[test]
fn test_snapshot_only_journal_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("empty_diffs.jsonl");
    fs::write(&path, JOURNAL.lines().next().ok_or("empty fixture")?)?;
    let file = path.to_str().ok_or("non-utf8 temp path")?;

    let output = depthbook(&["replay", "--file", file])?;
    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr)?.contains("no diff events were applied"));
    Ok(())
}

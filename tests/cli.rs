use std::process::Command;

use rmg_player::score::ScoreBuilder;

fn write_score(dir: &std::path::Path) -> std::path::PathBuf {
    let bytes = ScoreBuilder::new()
        .tempo(150)
        .block_sequence(&[0, 2])
        .step(0, 0, 60)
        .to_bytes();
    let path = dir.join("song.rmg");
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn info_prints_score_summary() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_score(dir.path());

    let output = Command::new(env!("CARGO_BIN_EXE_rmg-player"))
        .arg("info")
        .arg(&path)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("150 bpm"));
    assert!(stdout.contains("S 0 2 E"));
    assert!(stdout.contains("Block 0:           1 notes"));
}

#[test]
fn info_rejects_missing_file() {
    let output = Command::new(env!("CARGO_BIN_EXE_rmg-player"))
        .args(["info", "/nonexistent/song.rmg"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[cfg(feature = "export-midi")]
#[test]
fn export_midi_writes_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_score(dir.path());
    let out = dir.path().join("midi");

    let status = Command::new(env!("CARGO_BIN_EXE_rmg-player"))
        .arg("export-midi")
        .arg(&path)
        .arg("--dir")
        .arg(&out)
        .status()
        .unwrap();

    assert!(status.success());
    assert!(out.join("block4.mid").is_file());
    assert!(out.join("chords.mid").is_file());
}

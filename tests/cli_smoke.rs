use std::process::Command;

#[test]
fn help_exits_zero() {
    let out = Command::new(env!("CARGO_BIN_EXE_stillreel"))
        .arg("--help")
        .output()
        .expect("run stillreel --help");
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("--audio"));
    assert!(text.contains("--image"));
    assert!(text.contains("--overlay"));
}

#[test]
fn missing_required_args_exit_nonzero() {
    let out = Command::new(env!("CARGO_BIN_EXE_stillreel"))
        .output()
        .expect("run stillreel");
    assert!(!out.status.success());
}

#[test]
fn missing_audio_reports_asset_error() {
    let tmp = std::env::temp_dir().join(format!(
        "stillreel_cli_missing_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let out = Command::new(env!("CARGO_BIN_EXE_stillreel"))
        .args(["--audio", "/nonexistent/speech_1.mp3"])
        .args(["--image", "/nonexistent/image_1.png"])
        .arg("--out-dir")
        .arg(&tmp)
        .output()
        .expect("run stillreel");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("asset unreadable"), "stderr: {stderr}");
}

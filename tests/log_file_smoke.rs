#![allow(clippy::unwrap_used, clippy::expect_used)]

use landlord_lib::logging::LOG_FILE_NAME;

#[test]
fn file_logging_writes_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let guard = landlord_lib::init_file_logging(false, dir.path()).expect("file logging");
    tracing::info!(target: "landlord", event = "smoke_test", detail = "hello");
    drop(guard);

    let contents = std::fs::read_to_string(dir.path().join(LOG_FILE_NAME)).unwrap();
    let line = contents
        .lines()
        .find(|line| line.contains("smoke_test"))
        .expect("smoke event in log file");
    let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(parsed["target"], "landlord");
    assert_eq!(parsed["fields"]["event"], "smoke_test");
    assert!(contents.contains("file_logging_ready"));
}

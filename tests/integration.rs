use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn akr_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("akr");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(
        root.join("emails.json"),
        include_str!("fixtures/emails.json"),
    )
    .unwrap();

    let config_content = format!(
        r#"[dataset]
path = "{root}/data/akr.sqlite"

[patterns]
sizes = [2]

[queries]
broker = "kafka broker partition"

[report]
output_dir = "{root}/reports"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("akr.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_akr(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = akr_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run akr binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn init_and_import(config_path: &Path) {
    let (stdout, stderr, success) = run_akr(config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);

    let json = config_path.parent().unwrap().parent().unwrap().join("emails.json");
    let (stdout, stderr, success) = run_akr(config_path, &["import", json.to_str().unwrap()]);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("messages imported: 10"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_init_creates_dataset() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_akr(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_akr(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_akr(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_akr(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_relevance_thread() {
    let (_tmp, config_path) = setup_test_env();
    init_and_import(&config_path);

    let (stdout, stderr, success) = run_akr(&config_path, &["relevance", "--thread", "1"]);
    assert!(success, "relevance failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("mode: ratio"));
    assert!(stdout.contains("ak: 2  not-ak: 1  unknown: 1"));
    assert!(stdout.contains("relevance: 0.666667"));
}

#[test]
fn test_relevance_unknown_thread_fails() {
    let (_tmp, config_path) = setup_test_env();
    init_and_import(&config_path);

    let (_, stderr, success) = run_akr(&config_path, &["relevance", "--thread", "999"]);
    assert!(!success);
    assert!(stderr.contains("999"));
}

#[test]
fn test_relevance_normalized_count_mode() {
    let (_tmp, config_path) = setup_test_env();
    init_and_import(&config_path);

    let (stdout, stderr, success) = run_akr(
        &config_path,
        &["relevance", "--thread", "20", "--mode", "normalized-count"],
    );
    assert!(success, "relevance failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("mode: normalized-count"));
    assert!(stdout.contains("max_ak_count:"));
}

#[test]
fn test_top_threads_and_analyze_query() {
    let (_tmp, config_path) = setup_test_env();
    init_and_import(&config_path);

    let (stdout, stderr, success) =
        run_akr(&config_path, &["top-threads", "-q", "storage engine", "-n", "5"]);
    assert!(success, "top-threads failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Thread 1: weight: 1.000000"));

    let (stdout, stderr, success) =
        run_akr(&config_path, &["analyze-query", "-q", "storage engine", "-n", "5"]);
    assert!(success, "analyze-query failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("DCG: 1.000000"));
    assert!(stdout.contains("NDCG: 1.000000"));
}

#[test]
fn test_patterns_to_stdout() {
    let (_tmp, config_path) = setup_test_env();
    init_and_import(&config_path);

    let (stdout, stderr, success) = run_akr(&config_path, &["patterns"]);
    assert!(success, "patterns failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("# 2gram_no-skip.csv"));
    assert!(stdout.contains("# 2gram_skip.csv"));
    assert!(stdout.contains("# 2cooccurrence.csv"));
    assert!(stdout.contains("RANK,PATTERN,COUNT"));
}

#[test]
fn test_export_writes_hashed_ids() {
    let (tmp, config_path) = setup_test_env();
    init_and_import(&config_path);

    let out = tmp.path().join("export/data.json");
    let (stdout, stderr, success) =
        run_akr(&config_path, &["export", "--output", out.to_str().unwrap()]);
    assert!(success, "export failed: stdout={}, stderr={}", stdout, stderr);

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 7);
    assert!(messages.iter().all(|m| m["id_hash"].as_str().unwrap().len() == 43));
    assert_eq!(json["queries"][0]["name"], "broker");
}

#[test]
fn test_report_creates_timestamped_dir_and_zip() {
    let (tmp, config_path) = setup_test_env();
    init_and_import(&config_path);

    let (stdout, stderr, success) =
        run_akr(&config_path, &["report", "--zip", "--progress", "json"]);
    assert!(success, "report failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("archive:"));
    assert!(stderr.contains("\"phase\":\"finished\""));

    let reports: Vec<PathBuf> = fs::read_dir(tmp.path().join("reports"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert!(reports.iter().any(|p| p.is_dir()
        && p.file_name().unwrap().to_string_lossy().starts_with("report_")));
    assert!(reports
        .iter()
        .any(|p| p.extension().map(|e| e == "zip").unwrap_or(false)));
}

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const ROWS: &str = r#"{"_id":1,"label":"apple","qty":5}
{"_id":2,"label":"banana","qty":2}
{"_id":3,"label":"apricot","qty":9}
"#;

const REQUEST: &str = r#"{
  "draw": 4,
  "start": 0,
  "length": 1,
  "search": { "value": "ap" },
  "columns": [
    { "data": "label" },
    { "data": "qty", "searchable": false }
  ],
  "order": [ { "column": 1, "dir": "desc" } ]
}"#;

fn run_in(dir: &Path, extra: &[&str]) -> Output {
    run_request(dir, "request.json", extra)
}

fn run_request(dir: &Path, request: &str, extra: &[&str]) -> Output {
    fs::write(dir.join("rows.ndjson"), ROWS).unwrap();
    fs::write(dir.join("request.json"), REQUEST).unwrap();
    Command::new(env!("CARGO_BIN_EXE_doctables"))
        .current_dir(dir)
        .args(["--data", "rows.ndjson", "--request", request])
        .args(extra)
        .env_remove("DOCTABLES_CONFIG")
        .env_remove("DOCTABLES_LOG_DIR")
        .env_remove("DOCTABLES_QUERY_TIMEOUT_MS")
        .env_remove("DOCTABLES_DEVLOG")
        .output()
        .expect("spawn doctables")
}

fn json(out: &Output) -> serde_json::Value {
    serde_json::from_slice(&out.stdout).expect("stdout is one JSON object")
}

#[test]
fn prints_one_page_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_in(dir.path(), &[]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let v = json(&out);
    assert_eq!(v["draw"], 4);
    assert_eq!(v["recordsTotal"], 3);
    assert_eq!(v["recordsFiltered"], 2);
    assert_eq!(v["hasMore"], true);
    assert_eq!(v["data"][0]["label"], "apricot");
    assert!(v.get("error").is_none());
    assert!(dir.path().join("app.log").exists());
}

#[test]
fn pre_filter_narrows_total() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_in(dir.path(), &["--pre-filter", r#"{"field":"qty","$gte":5}"#]);
    assert!(out.status.success());
    let v = json(&out);
    assert_eq!(v["recordsTotal"], 2);
    assert_eq!(v["recordsFiltered"], 2);
}

#[test]
fn config_file_supplies_log_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("doctables.toml"), "log_dir = 'logs'\nlog_level = 'debug'\n").unwrap();
    let out = run_in(dir.path(), &[]);
    assert!(out.status.success());
    assert!(dir.path().join("logs").join("app.log").exists());
}

#[test]
fn devlog_switch_writes_bench_lines() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("doctables.toml"), "devlog = true\n").unwrap();
    let out = run_in(dir.path(), &[]);
    assert!(out.status.success());
    let dev = fs::read_to_string(dir.path().join("dev.log")).unwrap();
    assert!(dev.contains(r#""bench":"tables""#), "{dev}");
    assert!(!fs::read_to_string(dir.path().join("app.log")).unwrap().contains(r#""bench""#));
}

#[test]
fn query_error_exits_with_one_and_reports_it() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_in(dir.path(), &["--additional", r#"{"field":"label","$regex":"(oops"}"#]);
    assert_eq!(out.status.code(), Some(1));
    let v = json(&out);
    assert_eq!(v["draw"], 4);
    assert!(v["error"].as_str().unwrap().contains("invalid regex"));
    assert_eq!(v["data"].as_array().map(Vec::len), Some(0));
}

#[test]
fn unreadable_request_exits_with_two() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_request(dir.path(), "missing.json", &[]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).starts_with("doctables:"));
}

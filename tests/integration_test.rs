//! Integration tests for the portcullis CLI.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde_json::Value;

const PIPELINE_CONFIG: &str = r#"
[globals]
before = ["honeypot", { alias = "csrf", except = ["api/*"] }]
after = ["secureheaders", "performance"]

[methods]
post = ["performance"]

[[filters]]
alias = "cors"
before = ["api/*"]
after = ["api/*"]

[[routes]]
pattern = "admin/*"
before = ["forcehttps"]

[settings.cors]
allowed_origins = ["http://localhost"]
"#;

/// Create a temp directory holding `config.toml` with the given content.
fn create_config(name: &str, content: &str) -> PathBuf {
    let temp_dir = env::temp_dir().join(format!(
        "portcullis-test-{}-{}",
        name,
        std::process::id()
    ));
    fs::create_dir_all(&temp_dir).expect("Failed to create temp dir");

    let config_path = temp_dir.join("config.toml");
    fs::write(&config_path, content).expect("Failed to write config");
    config_path
}

fn cleanup(config_path: &Path) {
    if let Some(dir) = config_path.parent() {
        fs::remove_dir_all(dir).ok();
    }
}

/// Run portcullis with args and optional stdin; returns (stdout, stderr, exit_code).
fn run(args: &[&str], config_path: &Path, stdin: Option<&str>) -> (String, String, i32) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_portcullis"))
        .args(args)
        .arg("--config")
        .arg(config_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn portcullis");

    if let Some(mut pipe) = child.stdin.take() {
        if let Some(input) = stdin {
            pipe.write_all(input.as_bytes()).unwrap();
        }
    }

    let output = child.wait_with_output().expect("Failed to read output");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (stdout, stderr, exit_code)
}

/// Run `handle` with a JSON request against the shared pipeline config.
fn handle(name: &str, request: &str) -> (Value, i32) {
    let config_path = create_config(name, PIPELINE_CONFIG);
    let (stdout, stderr, exit_code) = run(&["handle"], &config_path, Some(request));
    cleanup(&config_path);

    let value = serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {stdout} / {stderr}"));
    (value, exit_code)
}

#[test]
fn test_handle_plain_get_reaches_handler() {
    let (response, exit_code) = handle("get", r#"{"method":"GET","path":"/shop/"}"#);

    assert_eq!(exit_code, 0);
    assert_eq!(response["status"], 200);
    assert_eq!(response["body"], "GET /shop");
    assert_eq!(response["headers"]["X-Frame-Options"], "SAMEORIGIN");
}

#[test]
fn test_handle_post_without_token_is_forbidden() {
    let (response, exit_code) = handle("csrf", r#"{"method":"POST","path":"contact"}"#);

    assert_eq!(exit_code, 0, "a short-circuit is a normal response");
    assert_eq!(response["status"], 403);
    // after-filters still run on the short-circuit response
    assert_eq!(response["headers"]["X-Content-Type-Options"], "nosniff");
}

#[test]
fn test_handle_post_with_token_reaches_handler() {
    let request = r#"{
        "method": "POST",
        "path": "contact",
        "cookies": {"csrf_cookie_name": "abc"},
        "form": {"csrf_test_name": "abc"},
        "body": "<p>took {elapsed_time}s</p>"
    }"#;
    let (response, exit_code) = handle("csrf-ok", request);

    assert_eq!(exit_code, 0);
    assert_eq!(response["status"], 200);
    let body = response["body"].as_str().unwrap();
    assert!(!body.contains("{elapsed_time}"), "placeholder replaced: {body}");
    assert!(response["headers"]["X-Elapsed-Time"].is_string());
}

#[test]
fn test_handle_route_filter_redirects_to_https() {
    let request = r#"{"method":"GET","path":"admin/users","headers":{"host":"shop.test"}}"#;
    let (response, exit_code) = handle("https", request);

    assert_eq!(exit_code, 0);
    assert_eq!(response["status"], 307);
    assert_eq!(response["headers"]["Location"], "https://shop.test/admin/users");
}

#[test]
fn test_handle_cors_preflight_terminates() {
    let request = r#"{
        "method": "OPTIONS",
        "path": "api/items",
        "headers": {"origin": "http://localhost", "access-control-request-method": "GET"}
    }"#;
    let (response, exit_code) = handle("cors", request);

    assert_eq!(exit_code, 0);
    assert_eq!(response["status"], 204);
    assert_eq!(response["headers"]["Access-Control-Allow-Origin"], "http://localhost");
    // terminal responses skip the after-filters
    assert!(response["headers"].get("X-Frame-Options").is_none());
}

#[test]
fn test_handle_honeypot_failure_is_an_error() {
    let request = r#"{"method":"POST","path":"api/contact","form":{"honeypot":"buy now"}}"#;
    let (response, exit_code) = handle("honeypot", request);

    assert_eq!(exit_code, 1);
    let message = response["error"].as_str().unwrap();
    assert!(message.contains("honeypot"), "{message}");
}

#[test]
fn test_handle_invalid_json_input() {
    let (response, exit_code) = handle("invalid", "not json");

    assert_eq!(exit_code, 1);
    assert!(response["error"]
        .as_str()
        .unwrap()
        .contains("Failed to parse request"));
}

#[test]
fn test_handle_empty_input() {
    let (response, exit_code) = handle("empty", "");

    assert_eq!(exit_code, 1);
    assert_eq!(response["error"], "No input received from stdin");
}

#[test]
fn test_resolve_prints_filter_set() {
    let config_path = create_config("resolve", PIPELINE_CONFIG);
    let (stdout, _stderr, exit_code) = run(
        &["resolve", "--method", "POST", "--path", "admin/users"],
        &config_path,
        None,
    );
    cleanup(&config_path);

    assert_eq!(exit_code, 0);
    let resolved: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(
        resolved["before"],
        serde_json::json!(["honeypot", "csrf", "performance", "forcehttps"])
    );
    assert_eq!(
        resolved["after"],
        serde_json::json!(["secureheaders", "performance"])
    );
}

#[test]
fn test_resolve_respects_except() {
    let config_path = create_config("except", PIPELINE_CONFIG);
    let (stdout, _stderr, exit_code) =
        run(&["resolve", "--path", "api/items"], &config_path, None);
    cleanup(&config_path);

    assert_eq!(exit_code, 0);
    let resolved: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(resolved["before"], serde_json::json!(["honeypot", "cors"]));
    assert_eq!(resolved["after"], serde_json::json!(["secureheaders", "performance", "cors"]));
}

#[test]
fn test_check_valid_config() {
    let config_path = create_config("check-ok", PIPELINE_CONFIG);
    let (_stdout, stderr, exit_code) = run(&["check"], &config_path, None);
    cleanup(&config_path);

    assert_eq!(exit_code, 0);
    assert!(stderr.contains("Configuration is valid."));
}

#[test]
fn test_check_unknown_alias_fails() {
    let config_path = create_config("check-unknown", "[globals]\nbefore = [\"ghost\"]\n");
    let (_stdout, stderr, exit_code) = run(&["check"], &config_path, None);
    cleanup(&config_path);

    assert_ne!(exit_code, 0);
    assert!(stderr.contains("ghost"), "stderr: {stderr}");
}

#[test]
fn test_check_composite_cycle_fails() {
    let config = "[aliases]\nloop_a = [\"loop_b\"]\nloop_b = [\"loop_a\"]\n";
    let config_path = create_config("check-cycle", config);
    let (_stdout, stderr, exit_code) = run(&["check"], &config_path, None);
    cleanup(&config_path);

    assert_ne!(exit_code, 0);
    assert!(stderr.contains("expands into itself"), "stderr: {stderr}");
}

#[test]
fn test_check_misplaced_filter_fails() {
    let config = "[[filters]]\nalias = \"csrf\"\nafter = [\"rare/*\"]\n";
    let config_path = create_config("check-misplaced", config);
    let (_stdout, stderr, exit_code) = run(&["check"], &config_path, None);
    cleanup(&config_path);

    assert_ne!(exit_code, 0);
    assert!(stderr.contains("does not support the after position"), "stderr: {stderr}");
}

#[test]
fn test_init_command_creates_config() {
    let temp_dir = env::temp_dir().join(format!("portcullis-test-init-{}", std::process::id()));
    fs::create_dir_all(&temp_dir).expect("Failed to create temp dir");
    let config_path = temp_dir.join("portcullis.toml");

    let output = Command::new(env!("CARGO_BIN_EXE_portcullis"))
        .arg("init")
        .arg("--path")
        .arg(&config_path)
        .output()
        .expect("Failed to run init command");

    assert!(output.status.success());
    assert!(config_path.exists(), "Config file should be created");

    let content = fs::read_to_string(&config_path).expect("Failed to read config");
    assert!(content.contains("[pipeline]"));
    assert!(content.contains("[globals]"));

    // the generated file is itself a valid configuration
    let (_stdout, stderr, exit_code) = run(&["check"], &config_path, None);
    assert_eq!(exit_code, 0, "stderr: {stderr}");

    fs::remove_dir_all(&temp_dir).ok();
}

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_portcullis"))
        .arg("--help")
        .output()
        .expect("Failed to run help command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("handle"));
    assert!(stdout.contains("resolve"));
}

#[test]
fn test_version_command() {
    let config_path = create_config("version", "");
    let (stdout, _stderr, exit_code) = run(&["version"], &config_path, None);
    cleanup(&config_path);

    assert_eq!(exit_code, 0);
    assert!(stdout.starts_with("portcullis "));
}

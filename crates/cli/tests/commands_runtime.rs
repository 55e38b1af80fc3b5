use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use chrono::{Local, Timelike};
use clap::Parser;
use serde_json::{json, Value};
use tempfile::TempDir;
use ziwu_cli::commands::{config, diagnose, doctor, prompt};
use ziwu_cli::{CaseArgs, Cli, Command};
use ziwu_core::TimeBranch;

#[test]
fn config_redacts_api_key_and_attributes_env_source() {
    with_env(&[("ZIWU_LLM_API_KEY", "sk-secret-value")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 0);
        assert!(result
            .output
            .contains("- llm.api_key = <redacted> (source: env (ZIWU_LLM_API_KEY))"));
        assert!(result.output.contains("- llm.model = gemini/gemini-3-pro-preview (source: default)"));
        assert!(!result.output.contains("sk-secret-value"));
    });
}

#[test]
fn config_accepts_litellm_aliases() {
    with_env(
        &[("LITELLM_API_KEY", "sk-alias"), ("LITELLM_API_BASE", "https://llm.internal.example")],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);
            assert!(result.output.contains("(source: env (LITELLM_API_KEY))"));
            assert!(result.output.contains(
                "- llm.base_url = https://llm.internal.example (source: env (LITELLM_API_BASE))"
            ));
        },
    );
}

#[test]
fn config_reports_validation_failure_without_api_key() {
    with_env(&[], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);
        assert!(result.output.starts_with("config validation failed"));
        assert!(result.output.contains("llm.api_key"));
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_fails() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_passes_with_key_and_readable_rules() {
    let dir = TempDir::new().expect("tempdir");
    let rules_path = write_rules(&dir);

    with_env(&[("ZIWU_LLM_API_KEY", "sk-test"), ("ZIWU_RULES_PATH", &rules_path)], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 0, "{}", result.output);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [ok] rule_document"));
        assert!(result.output.contains("- [ok] model_client"));
    });
}

#[test]
fn doctor_fails_when_rule_document_is_missing() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("missing.txt").display().to_string();

    with_env(&[("ZIWU_LLM_API_KEY", "sk-test"), ("ZIWU_RULES_PATH", &missing)], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["checks"][2]["name"], "rule_document");
        assert_eq!(payload["checks"][2]["status"], "fail");
    });
}

#[test]
fn prompt_renders_offline_with_rules_flag() {
    let dir = TempDir::new().expect("tempdir");
    let rules_path = write_rules(&dir);

    with_env(&[], || {
        let case = CaseArgs {
            complaint: "心悸气短".to_string(),
            visit: Some(TimeBranch::Wu),
            rules: Some(rules_path.clone().into()),
            ..CaseArgs::default()
        };

        let result = prompt::run(&case);
        assert_eq!(result.exit_code, 0, "{}", result.output);
        assert!(result.output.starts_with("=== system (schema v1) ==="));
        assert!(result.output.contains("午时心经当令"));
        assert!(result.output.contains("- 就诊时辰：午（11:00-13:00，手少阴心经当令）"));
        assert!(result.output.contains("心悸气短"));
    });
}

#[test]
fn prompt_rejects_blank_complaint() {
    with_env(&[], || {
        let case = CaseArgs { complaint: "  ".to_string(), ..CaseArgs::default() };

        let result = prompt::run(&case);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "prompt");
        assert_eq!(payload["error_class"], "invalid_case");
    });
}

#[test]
fn cli_parses_branch_flags() {
    let cli = Cli::try_parse_from([
        "ziwu",
        "prompt",
        "--complaint",
        "失眠多梦",
        "--visit",
        "子时",
        "--worse",
        "丑,子",
    ])
    .expect("parse");

    let Command::Prompt(case) = cli.command else {
        panic!("expected prompt command");
    };
    assert_eq!(case.visit, Some(TimeBranch::Zi));
    assert_eq!(case.onset, None);
    let request = case.to_request();
    assert_eq!(
        request.time_info.worse_time.into_iter().collect::<Vec<_>>(),
        vec![TimeBranch::Zi, TimeBranch::Chou]
    );
}

#[test]
fn visit_now_derives_branch_from_local_clock() {
    let cli = Cli::try_parse_from(["ziwu", "prompt", "--complaint", "心悸", "--visit-now"])
        .expect("parse");

    let Command::Prompt(case) = cli.command else {
        panic!("expected prompt command");
    };
    assert!(case.visit_now);
    assert_eq!(case.visit, None);

    let before = TimeBranch::containing(Local::now().hour());
    let visit = case.to_request().time_info.visit_time;
    let after = TimeBranch::containing(Local::now().hour());
    assert!(visit == Some(before) || visit == Some(after), "{visit:?}");
}

#[test]
fn visit_now_conflicts_with_explicit_visit() {
    assert!(Cli::try_parse_from([
        "ziwu",
        "prompt",
        "--complaint",
        "心悸",
        "--visit",
        "午",
        "--visit-now"
    ])
    .is_err());
}

#[test]
fn cli_rejects_unknown_branch_and_missing_complaint() {
    assert!(Cli::try_parse_from(["ziwu", "prompt", "--complaint", "头痛", "--visit", "13"]).is_err());
    assert!(Cli::try_parse_from(["ziwu", "diagnose", "--visit", "子"]).is_err());
}

#[test]
fn diagnose_prints_envelope_from_endpoint() {
    let dir = TempDir::new().expect("tempdir");
    let rules_path = write_rules(&dir);
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body())
        .expect(1)
        .create();
    let base_url = server.url();

    with_env(&[("ZIWU_LLM_API_KEY", "sk-test"), ("ZIWU_LLM_BASE_URL", &base_url)], || {
        let case = CaseArgs {
            complaint: "失眠多梦，夜间加重".to_string(),
            visit: Some(TimeBranch::Zi),
            worse: vec![TimeBranch::Zi, TimeBranch::Chou],
            rules: Some(rules_path.clone().into()),
            ..CaseArgs::default()
        };

        let result = diagnose::run(&case);
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["success"], true);
        assert_eq!(payload["data"]["diagnosis"]["summary"], "心肝火旺证");
    });

    mock.assert();
}

#[test]
fn diagnose_with_missing_rules_fails_without_model_call() {
    let dir = TempDir::new().expect("tempdir");
    let mut server = mockito::Server::new();
    let mock = server.mock("POST", "/chat/completions").expect(0).create();
    let base_url = server.url();

    with_env(&[("ZIWU_LLM_API_KEY", "sk-test"), ("ZIWU_LLM_BASE_URL", &base_url)], || {
        let case = CaseArgs {
            complaint: "头痛".to_string(),
            rules: Some(dir.path().join("missing.txt")),
            ..CaseArgs::default()
        };

        let result = diagnose::run(&case);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["success"], false);
        assert_eq!(payload["error"], "Failed to load diagnosis rules");
    });

    mock.assert();
}

fn write_rules(dir: &TempDir) -> String {
    let path = dir.path().join("rules.txt");
    fs::write(&path, "子时胆经当令。\n午时心经当令。\n").expect("write rules");
    path.display().to_string()
}

fn completion_body() -> String {
    let content = json!({
        "diagnosis": { "summary": "心肝火旺证", "analysis": "舌红脉弦数" },
        "midnight_noon_ebb_flow_analysis": { "main_meridian": "足少阳胆经", "reasoning": "子时加重" },
        "treatment_recommendations": {
            "clinical": [],
            "lifestyle": [],
            "exercise": [],
            "audio_therapy": { "tone": "角", "tracks": [], "schedule": [], "reason": "疏肝" }
        }
    });
    json!({ "choices": [{ "message": { "role": "assistant", "content": content.to_string() } }] })
        .to_string()
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "ZIWU_LLM_API_KEY",
        "ZIWU_LLM_BASE_URL",
        "ZIWU_LLM_MODEL",
        "ZIWU_LLM_TIMEOUT_SECS",
        "ZIWU_RULES_PATH",
        "ZIWU_SERVER_BIND_ADDRESS",
        "ZIWU_SERVER_PORT",
        "ZIWU_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "ZIWU_LOGGING_LEVEL",
        "ZIWU_LOGGING_FORMAT",
        "ZIWU_LOG_LEVEL",
        "ZIWU_LOG_FORMAT",
        "LITELLM_API_KEY",
        "LITELLM_API_BASE",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}

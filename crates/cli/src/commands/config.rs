use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;
use ziwu_core::config::{resolve_config_path, AppConfig, LoadOptions};

use crate::commands::CommandResult;

struct FieldLine<'a> {
    key: &'static str,
    value: String,
    env_keys: &'a [&'static str],
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::text(2, format!("config validation failed: {error}")),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    let fields = [
        FieldLine {
            key: "llm.api_key",
            value: llm_api_key.to_string(),
            env_keys: &["ZIWU_LLM_API_KEY", "LITELLM_API_KEY"],
        },
        FieldLine {
            key: "llm.base_url",
            value: config.llm.base_url.clone(),
            env_keys: &["ZIWU_LLM_BASE_URL", "LITELLM_API_BASE"],
        },
        FieldLine { key: "llm.model", value: config.llm.model.clone(), env_keys: &["ZIWU_LLM_MODEL"] },
        FieldLine {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["ZIWU_LLM_TIMEOUT_SECS"],
        },
        FieldLine {
            key: "rules.path",
            value: config.rules.path.display().to_string(),
            env_keys: &["ZIWU_RULES_PATH"],
        },
        FieldLine {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["ZIWU_SERVER_BIND_ADDRESS"],
        },
        FieldLine {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["ZIWU_SERVER_PORT"],
        },
        FieldLine {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["ZIWU_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        FieldLine {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["ZIWU_LOGGING_LEVEL", "ZIWU_LOG_LEVEL"],
        },
        FieldLine {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["ZIWU_LOGGING_FORMAT", "ZIWU_LOG_FORMAT"],
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult::text(0, lines.join("\n"))
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

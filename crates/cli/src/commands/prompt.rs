use std::path::PathBuf;

use ziwu_agent::{prompt, FileRuleRepository, RuleSource};
use ziwu_core::config::{AppConfig, LoadOptions};

use crate::commands::CommandResult;
use crate::CaseArgs;

const COMMAND: &str = "prompt";

/// Renders the prompt pair offline. With `--rules` no configuration is
/// loaded, so this works before an API key exists.
pub fn run(case: &CaseArgs) -> CommandResult {
    let request = case.to_request();
    if !request.medical_record.has_complaint() {
        return CommandResult::failure(COMMAND, "invalid_case", "--complaint must not be empty", 2);
    }

    let rules_path = match resolve_rules_path(case) {
        Ok(path) => path,
        Err(message) => return CommandResult::failure(COMMAND, "config_validation", message, 2),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                1,
            )
        }
    };

    let repository = FileRuleRepository::new(rules_path);
    let rule = match runtime.block_on(repository.get()) {
        Ok(rule) => rule,
        Err(error) => return CommandResult::failure(COMMAND, "rule_document", error.to_string(), 3),
    };

    let pair = prompt::build(&request.medical_record, &request.time_info, &rule);
    CommandResult::text(
        0,
        format!(
            "=== system (schema v{}) ===\n{}\n=== user ===\n{}",
            prompt::PROMPT_SCHEMA_VERSION,
            pair.system,
            pair.user
        ),
    )
}

fn resolve_rules_path(case: &CaseArgs) -> Result<PathBuf, String> {
    if let Some(path) = &case.rules {
        return Ok(path.clone());
    }
    AppConfig::load(LoadOptions::default())
        .map(|config| config.rules.path)
        .map_err(|error| format!("{error} (pass --rules to render without configuration)"))
}

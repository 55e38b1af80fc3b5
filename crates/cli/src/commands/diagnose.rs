use std::sync::Arc;

use anyhow::{Context, Result};
use ziwu_agent::{DiagnosisReply, DiagnosisRuntime, FileRuleRepository, OpenAiCompatibleClient};
use ziwu_core::config::{AppConfig, ConfigOverrides, LoadOptions};

use crate::commands::CommandResult;
use crate::CaseArgs;

const COMMAND: &str = "diagnose";

pub fn run(case: &CaseArgs) -> CommandResult {
    let options = LoadOptions {
        overrides: ConfigOverrides { rules_path: case.rules.clone(), ..ConfigOverrides::default() },
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
        }
    };

    match execute(&config, case) {
        Ok(reply) => {
            let exit_code = if reply.envelope.success { 0 } else { 1 };
            let output = serde_json::to_string_pretty(&reply.envelope)
                .unwrap_or_else(|error| format!("{{\"success\":false,\"error\":\"{error}\"}}"));
            CommandResult::text(exit_code, output)
        }
        Err(error) => CommandResult::failure(COMMAND, "runtime", format!("{error:#}"), 1),
    }
}

fn execute(config: &AppConfig, case: &CaseArgs) -> Result<DiagnosisReply> {
    let llm = OpenAiCompatibleClient::new(&config.llm).context("model client setup failed")?;
    let rules = FileRuleRepository::new(config.rules.path.clone());
    let diagnosis = DiagnosisRuntime::new(Arc::new(rules), Arc::new(llm));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;

    Ok(runtime.block_on(diagnosis.diagnose(&case.to_request())))
}

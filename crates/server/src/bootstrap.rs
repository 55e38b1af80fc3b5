use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use ziwu_agent::{DiagnosisRuntime, FileRuleRepository, OpenAiCompatibleClient, RuleSource};
use ziwu_core::config::{AppConfig, ConfigError};
use ziwu_core::ModelError;

pub struct Application {
    pub config: AppConfig,
    pub rules: Arc<FileRuleRepository>,
    pub runtime: Arc<DiagnosisRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("model client initialisation failed: {0}")]
    ModelClient(#[source] ModelError),
}

/// Wires the long-lived rule cache and HTTP client into one runtime.
///
/// A rule document that cannot be read yet does not stop startup; requests
/// and `/health` report it until the file is fixed.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;

    let llm = OpenAiCompatibleClient::new(&config.llm).map_err(BootstrapError::ModelClient)?;
    info!(
        event_name = "system.bootstrap.model_client_ready",
        correlation_id = "bootstrap",
        endpoint = %llm.endpoint(),
        model = %llm.model(),
        "model client configured"
    );

    let rules = Arc::new(FileRuleRepository::new(config.rules.path.clone()));
    match rules.get().await {
        Ok(_) => info!(
            event_name = "system.bootstrap.rules_ready",
            correlation_id = "bootstrap",
            path = %rules.path().display(),
            "rule document warmed"
        ),
        Err(error) => warn!(
            event_name = "system.bootstrap.rules_unavailable",
            correlation_id = "bootstrap",
            error = %error,
            "rule document unavailable at startup; diagnosis requests will fail until it is readable"
        ),
    }

    let runtime = Arc::new(DiagnosisRuntime::new(rules.clone(), Arc::new(llm)));
    Ok(Application { config, rules, runtime })
}

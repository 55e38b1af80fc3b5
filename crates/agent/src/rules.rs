use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::info;
use ziwu_core::RuleError;

/// Source of the chronotherapy ruleset embedded in every system prompt.
#[async_trait]
pub trait RuleSource: Send + Sync {
    async fn get(&self) -> Result<Arc<str>, RuleError>;
}

/// Ruleset read from disk on first use and kept for the life of the process.
///
/// A failed read is not cached, so a broken deployment keeps failing the
/// same way until the file is fixed. A successful read is never refreshed.
#[derive(Debug)]
pub struct FileRuleRepository {
    path: PathBuf,
    cached: OnceCell<Arc<str>>,
}

impl FileRuleRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cached: OnceCell::new() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.cached.initialized()
    }

    async fn read(&self) -> Result<Arc<str>, RuleError> {
        let shown = self.path.display().to_string();
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|error| RuleError::Unreadable { path: shown.clone(), reason: error.to_string() })?;

        let text = String::from_utf8(bytes).map_err(|_| RuleError::Unreadable {
            path: shown.clone(),
            reason: "document is not valid UTF-8".to_string(),
        })?;

        if text.trim().is_empty() {
            return Err(RuleError::Empty(shown));
        }

        info!(
            event_name = "diagnosis.rules.loaded",
            path = %shown,
            rule_chars = text.chars().count(),
            "chronotherapy ruleset loaded"
        );
        Ok(Arc::from(text))
    }
}

#[async_trait]
impl RuleSource for FileRuleRepository {
    async fn get(&self) -> Result<Arc<str>, RuleError> {
        self.cached.get_or_try_init(|| self.read()).await.map(Arc::clone)
    }
}

/// Fixed in-memory ruleset.
#[derive(Clone, Debug)]
pub struct StaticRuleSource(Arc<str>);

impl StaticRuleSource {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }
}

#[async_trait]
impl RuleSource for StaticRuleSource {
    async fn get(&self) -> Result<Arc<str>, RuleError> {
        Ok(Arc::clone(&self.0))
    }
}

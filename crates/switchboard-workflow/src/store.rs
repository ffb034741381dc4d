//! Context persistence keyed by session id.
//!
//! A store lets a later workflow run of the same session pick up the history
//! an earlier run left behind. Two implementations are provided: an in-memory
//! map for tests and single-process use, and a directory of JSON files.

use crate::context::WorkflowContext;
use crate::error::{Result, WorkflowError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Loads and saves workflow contexts by session id.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// The last context saved for `session_id`, if any.
    async fn load(&self, session_id: &str) -> Result<Option<WorkflowContext>>;

    /// Saves `context` under its session id, replacing any earlier save.
    async fn save(&self, context: &WorkflowContext) -> Result<()>;
}

/// Store that keeps contexts in process memory.
#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    contexts: RwLock<HashMap<String, WorkflowContext>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions stored.
    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.contexts.read().await.is_empty()
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn load(&self, session_id: &str) -> Result<Option<WorkflowContext>> {
        Ok(self.contexts.read().await.get(session_id).cloned())
    }

    async fn save(&self, context: &WorkflowContext) -> Result<()> {
        if context.session_id.is_empty() {
            return Err(WorkflowError::Store("context has no session id".to_string()));
        }
        self.contexts.write().await.insert(context.session_id.clone(), context.clone());
        Ok(())
    }
}

/// Store that writes one JSON file per session.
///
/// Files are written to a temporary path and renamed into place, so a
/// reader never observes a partial write.
#[derive(Debug, Clone)]
pub struct FileContextStore {
    dir: PathBuf,
}

impl FileContextStore {
    /// Stores files under `dir`, creating it on first save.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        let valid = !session_id.is_empty()
            && session_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(WorkflowError::Store(format!("invalid session id '{}'", session_id)));
        }
        Ok(self.dir.join(format!("{}.json", session_id)))
    }
}

#[async_trait]
impl ContextStore for FileContextStore {
    async fn load(&self, session_id: &str) -> Result<Option<WorkflowContext>> {
        let path = self.path_for(session_id)?;
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(WorkflowError::Store(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        let context = serde_json::from_str(&json).map_err(|e| {
            WorkflowError::Store(format!("failed to parse {}: {}", path.display(), e))
        })?;
        debug!(session_id, path = %path.display(), "Loaded workflow context");
        Ok(Some(context))
    }

    async fn save(&self, context: &WorkflowContext) -> Result<()> {
        let path = self.path_for(&context.session_id)?;
        let json = serde_json::to_string_pretty(context)
            .map_err(|e| WorkflowError::Store(format!("failed to encode context: {}", e)))?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            WorkflowError::Store(format!("failed to create {}: {}", self.dir.display(), e))
        })?;
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, json)
            .await
            .map_err(|e| WorkflowError::Store(format!("failed to write {}: {}", temp_path.display(), e)))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| WorkflowError::Store(format!("failed to rename {}: {}", path.display(), e)))?;

        debug!(session_id = %context.session_id, path = %path.display(), "Saved workflow context");
        Ok(())
    }
}

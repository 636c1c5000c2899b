use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tokio::sync::Mutex;

use shared::domain::{Progress, TutorialId};

/// Stable identity of a workspace folder, used as the persistence key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceKey(String);

impl WorkspaceKey {
    /// Hashes the canonical form of `root` so that different spellings of the
    /// same folder share progress.
    pub fn for_root(root: &Path) -> Self {
        let canonical = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
        Self(URL_SAFE_NO_PAD.encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkspaceKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct StoredProgressSummary {
    pub workspace_key: WorkspaceKey,
    pub tutorial_id: TutorialId,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load_progress(&self, key: &WorkspaceKey) -> Result<Option<Progress>>;
    async fn save_progress(&self, key: &WorkspaceKey, progress: &Progress) -> Result<()>;
    async fn clear_progress(&self, key: &WorkspaceKey) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens its own database.
        let max_connections = if is_memory_url(database_url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tutorial_progress (
                workspace_key TEXT PRIMARY KEY,
                tutorial_id   TEXT NOT NULL,
                progress_json TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure tutorial_progress table exists")?;
        Ok(())
    }

    pub async fn list_progress(&self) -> Result<Vec<StoredProgressSummary>> {
        let rows = sqlx::query(
            "SELECT workspace_key, tutorial_id, updated_at FROM tutorial_progress ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let key: String = row.try_get("workspace_key")?;
                let tutorial_id: String = row.try_get("tutorial_id")?;
                let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
                Ok(StoredProgressSummary {
                    workspace_key: WorkspaceKey(key),
                    tutorial_id: TutorialId(tutorial_id),
                    updated_at,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ProgressStore for Storage {
    async fn load_progress(&self, key: &WorkspaceKey) -> Result<Option<Progress>> {
        let row = sqlx::query("SELECT progress_json FROM tutorial_progress WHERE workspace_key = ?1")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("progress_json")?;
        let progress = serde_json::from_str(&raw).with_context(|| {
            format!("stored progress for workspace '{}' is corrupt", key.as_str())
        })?;
        Ok(Some(progress))
    }

    async fn save_progress(&self, key: &WorkspaceKey, progress: &Progress) -> Result<()> {
        let raw = serde_json::to_string(progress)?;
        sqlx::query(
            r#"
            INSERT INTO tutorial_progress (workspace_key, tutorial_id, progress_json, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(workspace_key) DO UPDATE SET
                tutorial_id = excluded.tutorial_id,
                progress_json = excluded.progress_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key.as_str())
        .bind(progress.tutorial.id.as_str())
        .bind(raw)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to save tutorial progress")?;
        Ok(())
    }

    async fn clear_progress(&self, key: &WorkspaceKey) -> Result<()> {
        sqlx::query("DELETE FROM tutorial_progress WHERE workspace_key = ?1")
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Non-persistent store for sessions without a database.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<WorkspaceKey, Progress>>,
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn load_progress(&self, key: &WorkspaceKey) -> Result<Option<Progress>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn save_progress(&self, key: &WorkspaceKey, progress: &Progress) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.clone(), progress.clone());
        Ok(())
    }

    async fn clear_progress(&self, key: &WorkspaceKey) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use test_runner::{TestCommand, DEFAULT_TIMEOUT};

pub const SETTINGS_FILE: &str = "tutorial.toml";
const ENV_PREFIX: &str = "TUTORIAL__";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub workspace_root: Option<PathBuf>,
    pub database_url: String,
    pub remote_name: String,
    pub test_command: String,
    pub test_timeout: Duration,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workspace_root: None,
            database_url: "sqlite://./data/tutorial.db".into(),
            remote_name: git_checkpoint::DEFAULT_REMOTE.into(),
            test_command: "npm test".into(),
            test_timeout: DEFAULT_TIMEOUT,
            committer_name: None,
            committer_email: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    workspace_root: Option<PathBuf>,
    database_url: Option<String>,
    remote_name: Option<String>,
    test_command: Option<String>,
    test_timeout_secs: Option<u64>,
    committer_name: Option<String>,
    committer_email: Option<String>,
}

impl Settings {
    pub fn test_command(&self) -> anyhow::Result<TestCommand> {
        TestCommand::parse(&self.test_command)
            .with_context(|| format!("test command '{}' is empty", self.test_command))
    }

    pub fn committer(&self) -> Option<(String, String)> {
        Some((self.committer_name.clone()?, self.committer_email.clone()?))
    }
}

/// Loads defaults, then `tutorial.toml` from the working directory, then
/// `TUTORIAL__*` environment variables.
pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?;
        apply_file(&mut settings, file_cfg);
    }

    let var = |name: &str| env(&format!("{ENV_PREFIX}{name}"));
    if let Some(v) = var("WORKSPACE_ROOT") {
        settings.workspace_root = Some(PathBuf::from(v));
    }
    if let Some(v) = var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("REMOTE_NAME") {
        settings.remote_name = v;
    }
    if let Some(v) = var("TEST_COMMAND") {
        settings.test_command = v;
    }
    if let Some(v) = var("TEST_TIMEOUT_SECS") {
        let secs = v
            .parse::<u64>()
            .with_context(|| format!("{ENV_PREFIX}TEST_TIMEOUT_SECS must be a number, got '{v}'"))?;
        settings.test_timeout = Duration::from_secs(secs);
    }
    if let Some(v) = var("COMMITTER_NAME") {
        settings.committer_name = Some(v);
    }
    if let Some(v) = var("COMMITTER_EMAIL") {
        settings.committer_email = Some(v);
    }

    settings.database_url = normalize_database_url(&settings.database_url);
    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.workspace_root {
        settings.workspace_root = Some(v);
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.remote_name {
        settings.remote_name = v;
    }
    if let Some(v) = file_cfg.test_command {
        settings.test_command = v;
    }
    if let Some(v) = file_cfg.test_timeout_secs {
        settings.test_timeout = Duration::from_secs(v);
    }
    if let Some(v) = file_cfg.committer_name {
        settings.committer_name = Some(v);
    }
    if let Some(v) = file_cfg.committer_email {
        settings.committer_email = Some(v);
    }
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;

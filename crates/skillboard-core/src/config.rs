use crate::errors::ConfigError;
use crate::storage::StoreOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillboardConfig {
    pub db_path: PathBuf,
    /// Age after which a stored profile is considered stale.
    pub freshness_ttl_secs: u64,
    pub busy_timeout_ms: u64,
    /// Page size for `top` / `recent` when none is given.
    pub default_limit: u32,
    pub log_level: String,
}

impl Default for SkillboardConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".skillboard/profiles.db"),
            freshness_ttl_secs: 3600,
            busy_timeout_ms: 5000,
            default_limit: 20,
            log_level: "info".to_string(),
        }
    }
}

impl SkillboardConfig {
    pub fn freshness_ttl(&self) -> Duration {
        Duration::from_secs(self.freshness_ttl_secs)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }

    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `SKILLBOARD_*` overrides. Unparseable numbers are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("SKILLBOARD_DB") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("SKILLBOARD_FRESHNESS_TTL_SECS") {
            if let Ok(n) = v.parse() {
                self.freshness_ttl_secs = n;
            }
        }
        if let Some(v) = lookup("SKILLBOARD_BUSY_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.busy_timeout_ms = n;
            }
        }
        if let Some(v) = lookup("SKILLBOARD_LOG") {
            self.log_level = v;
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: SkillboardConfig,
    /// Keys present in the file that no field consumed.
    pub ignored_keys: Vec<String>,
}

pub fn load_config(path: &Path, strict: bool) -> Result<LoadedConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;

    let mut ignored = std::collections::BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);
    let mut cfg: SkillboardConfig = serde_ignored::deserialize(deserializer, |p| {
        ignored.insert(p.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    let ignored_keys: Vec<String> = ignored.into_iter().collect();
    if strict && !ignored_keys.is_empty() {
        return Err(ConfigError(format!(
            "Unknown fields detected in strict mode: {:?} (file: {})",
            ignored_keys,
            path.display()
        )));
    }

    if cfg.default_limit == 0 {
        return Err(ConfigError("default_limit must be at least 1".into()));
    }

    // Relative database paths are anchored at the config file's directory.
    if cfg.db_path.is_relative() {
        if let Some(dir) = path.parent() {
            cfg.db_path = dir.join(&cfg.db_path);
        }
    }

    Ok(LoadedConfig {
        config: cfg,
        ignored_keys,
    })
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(
        path,
        r#"db_path: .skillboard/profiles.db
freshness_ttl_secs: 3600
busy_timeout_ms: 5000
default_limit: 20
log_level: info
"#,
    )
    .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}

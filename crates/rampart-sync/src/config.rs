//! Run configuration.

use crate::error::{Result, SyncError};
use rampart_taxonomy::{builtin, Forest};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default transaction budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default author of bootstrap content.
pub const DEFAULT_AUTHOR: &str = "system";

/// Configuration for sync and audit runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// RocksDB directory
    pub data_dir: PathBuf,

    /// Taxonomy file (TOML or JSON); the built-in forest when unset
    pub taxonomy: Option<PathBuf>,

    /// Account credited with bootstrap content
    pub system_author: String,

    /// Upper bound for a whole reconciliation transaction
    pub txn_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./rampart-data"),
            taxonomy: None,
            system_author: DEFAULT_AUTHOR.to_string(),
            txn_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SyncConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let data_dir = lookup("RAMPART_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let taxonomy = lookup("RAMPART_TAXONOMY")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let system_author = lookup("RAMPART_SYSTEM_AUTHOR")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.system_author);

        let txn_timeout = match lookup("RAMPART_TXN_TIMEOUT_SECS") {
            Some(raw) => parse_timeout(&raw)?,
            None => defaults.txn_timeout,
        };

        Ok(Self {
            data_dir,
            taxonomy,
            system_author,
            txn_timeout,
        })
    }

    /// Load the declarative forest this config points at.
    pub fn load_forest(&self) -> Result<Forest> {
        match &self.taxonomy {
            Some(path) => load_forest_file(path),
            None => Ok(builtin::forest()),
        }
    }
}

/// Parse a timeout in whole seconds. Zero is rejected.
pub fn parse_timeout(raw: &str) -> Result<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(SyncError::Config(format!(
            "invalid transaction timeout '{}': expected a positive number of seconds",
            raw
        ))),
    }
}

/// Read a forest from a `.toml` or `.json` file.
pub fn load_forest_file(path: &Path) -> Result<Forest> {
    let load_error = |reason: String| SyncError::Load {
        path: path.display().to_string(),
        reason,
    };

    let text = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        Forest::from_json_str(&text).map_err(|e| load_error(e.to_string()))
    } else {
        Forest::from_toml_str(&text).map_err(|e| load_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = SyncConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.load_forest().unwrap(), builtin::forest());
    }

    #[test]
    fn env_overrides() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("RAMPART_DATA_DIR", "/var/lib/rampart"),
            ("RAMPART_TAXONOMY", "forums.toml"),
            ("RAMPART_SYSTEM_AUTHOR", " degen-bot "),
            ("RAMPART_TXN_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/rampart"));
        assert_eq!(config.taxonomy, Some(PathBuf::from("forums.toml")));
        assert_eq!(config.system_author, "degen-bot");
        assert_eq!(config.txn_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_timeout() {
        for raw in ["0", "-3", "soon"] {
            let result = SyncConfig::from_lookup(lookup(&[("RAMPART_TXN_TIMEOUT_SECS", raw)]));
            assert!(matches!(result, Err(SyncError::Config(_))), "{}", raw);
        }
    }

    #[test]
    fn loads_toml_forest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forums.toml");
        std::fs::write(
            &path,
            r#"
[[zones]]
slug = "the-pit"
name = "The Pit"

[zones.default_rules]
tipping_enabled = true

[[zones.forums]]
slug = "shill-zone"
name = "Shill Zone"

[zones.forums.rules]
required_prefix = true
"#,
        )
        .unwrap();

        let forest = load_forest_file(&path).unwrap();
        assert_eq!(forest.zones[0].default_rules.tipping_enabled, Some(true));
        assert_eq!(forest.zones[0].forums[0].rules.required_prefix, Some(true));
    }

    #[test]
    fn loads_json_forest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forums.json");
        std::fs::write(&path, r#"{"zones":[{"slug":"the-pit","name":"The Pit"}]}"#).unwrap();
        assert_eq!(load_forest_file(&path).unwrap().zones.len(), 1);
    }

    #[test]
    fn load_error_names_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[[zones]]\nslug = 3\n").unwrap();

        let err = load_forest_file(&path).unwrap_err();
        assert!(matches!(err, SyncError::Load { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }
}

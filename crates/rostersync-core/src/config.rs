//! Configuration discovery and loading
//!
//! Configuration lives in `rostersync.yaml`, `rostersync.yml`,
//! `rostersync.json` or `rostersync.toml`. Every section is optional:
//!
//! ```yaml
//! mappings:
//!   directory: ./mappings      # overrides built-in mapping files
//! reconcile:
//!   writeAuditRefresh: true    # persist audit-only changes
//! processing:
//!   stampAudit: true           # set timemodified on every reconciled record
//!   crosslistType: merge       # type for crosslists the feed leaves untyped
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};
use crate::kinds::crosslist::CROSSLIST_TYPES;
use crate::reconcile::ReconcilePolicy;

const CONFIG_FILENAMES: [&str; 4] = [
    "rostersync.yaml",
    "rostersync.yml",
    "rostersync.json",
    "rostersync.toml",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default)]
    pub mappings: MappingsConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingsConfig {
    /// Directory of `<dialect>/<kind>.json` files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileConfig {
    #[serde(default = "default_true")]
    pub write_audit_refresh: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            write_audit_refresh: true,
        }
    }
}

impl From<&ReconcileConfig> for ReconcilePolicy {
    fn from(config: &ReconcileConfig) -> Self {
        ReconcilePolicy {
            write_audit_refresh: config.write_audit_refresh,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingConfig {
    #[serde(default = "default_true")]
    pub stamp_audit: bool,
    #[serde(default = "default_crosslist_type")]
    pub crosslist_type: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            stamp_audit: true,
            crosslist_type: default_crosslist_type(),
        }
    }
}

impl ProcessingConfig {
    pub fn validate(&self) -> Result<()> {
        let kind = self.crosslist_type.to_lowercase();
        if !CROSSLIST_TYPES.contains(&kind.as_str()) {
            return Err(SyncError::Config {
                message: format!(
                    "Unknown crosslistType '{}' (expected one of: {})",
                    self.crosslist_type,
                    CROSSLIST_TYPES.join(", ")
                ),
            });
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_crosslist_type() -> String {
    "merge".to_string()
}

impl SyncConfig {
    /// Load from a file, choosing the format by extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str());
        let parsed = match ext {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("json") => Self::from_json_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            _ => Err(SyncError::Config {
                message: "Unsupported file extension (expected .yaml, .yml, .json or .toml)"
                    .to_string(),
            }),
        };

        let mut config = parsed.map_err(|e| SyncError::Config {
            message: format!("Failed to load config from '{}': {}", path.display(), e),
        })?;
        config.resolve_paths(path.parent());
        config.processing.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(config_error)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(config_error)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(config_error)
    }

    /// Make a relative mapping directory relative to the config file
    fn resolve_paths(&mut self, base: Option<&Path>) {
        if let (Some(dir), Some(base)) = (&self.mappings.directory, base)
            && dir.is_relative()
        {
            self.mappings.directory = Some(base.join(dir));
        }
    }
}

fn config_error(error: impl std::fmt::Display) -> SyncError {
    SyncError::Config {
        message: error.to_string(),
    }
}

/// Configuration loader for discovering and loading config files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Auto-discover a config file by traversing upward from `start_path`
    ///
    /// In each directory the names are tried in the order
    /// `rostersync.yaml`, `rostersync.yml`, `rostersync.json`,
    /// `rostersync.toml`.
    pub fn auto_discover(start_path: &Path) -> Result<Option<PathBuf>> {
        let mut current = start_path.canonicalize().map_err(|e| SyncError::Config {
            message: format!("Invalid path: {e}"),
        })?;

        loop {
            for filename in CONFIG_FILENAMES {
                let config_path = current.join(filename);
                if config_path.is_file() {
                    tracing::debug!("Found config: {}", config_path.display());
                    return Ok(Some(config_path));
                }
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    /// Load from an explicit path, or discover one, or fall back to defaults
    pub fn load(custom_path: Option<&Path>, start_dir: Option<&Path>) -> Result<SyncConfig> {
        if let Some(path) = custom_path {
            if !path.exists() {
                return Err(SyncError::Config {
                    message: format!("Config file not found: {}", path.display()),
                });
            }
            return SyncConfig::load(path);
        }

        let search_dir = start_dir.unwrap_or_else(|| Path::new("."));
        match Self::auto_discover(search_dir)? {
            Some(path) => SyncConfig::load(&path),
            None => {
                tracing::debug!("No config file found, using defaults");
                Ok(SyncConfig::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_temp_config(dir: &Path, filename: &str, content: &str) -> PathBuf {
        let path = dir.join(filename);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert!(config.reconcile.write_audit_refresh);
        assert!(config.processing.stamp_audit);
        assert_eq!(config.processing.crosslist_type, "merge");
        assert!(config.mappings.directory.is_none());
    }

    #[test]
    fn test_load_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_config(
            temp_dir.path(),
            "rostersync.yaml",
            "reconcile:\n  writeAuditRefresh: false\nmappings:\n  directory: maps\n",
        );

        let config = SyncConfig::load(&path).unwrap();
        assert!(!config.reconcile.write_audit_refresh);
        assert!(config.processing.stamp_audit);
        assert_eq!(config.mappings.directory, Some(temp_dir.path().join("maps")));
    }

    #[test]
    fn test_load_json_and_toml() {
        let temp_dir = TempDir::new().unwrap();
        let json = create_temp_config(
            temp_dir.path(),
            "rostersync.json",
            r#"{"processing": {"stampAudit": false, "crosslistType": "meta"}}"#,
        );
        let config = SyncConfig::load(&json).unwrap();
        assert!(!config.processing.stamp_audit);
        assert_eq!(config.processing.crosslist_type, "meta");

        let toml = create_temp_config(
            temp_dir.path(),
            "rostersync.toml",
            "[mappings]\ndirectory = \"/etc/rostersync/mappings\"\n",
        );
        let config = SyncConfig::load(&toml).unwrap();
        assert_eq!(
            config.mappings.directory,
            Some(PathBuf::from("/etc/rostersync/mappings"))
        );
    }

    #[test]
    fn test_unknown_crosslist_type_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_config(
            temp_dir.path(),
            "rostersync.yaml",
            "processing:\n  crosslistType: blend\n",
        );
        let err = SyncConfig::load(&path).unwrap_err();
        assert!(matches!(err, SyncError::Config { ref message } if message.contains("blend")));

        let mut processing = ProcessingConfig::default();
        processing.crosslist_type = "Meta".to_string();
        assert!(processing.validate().is_ok());
    }

    #[test]
    fn test_unsupported_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_config(temp_dir.path(), "rostersync.ini", "x=1");
        assert!(matches!(SyncConfig::load(&path), Err(SyncError::Config { .. })));
    }

    #[test]
    fn test_invalid_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_config(
            temp_dir.path(),
            "rostersync.json",
            r#"{"reconcile": {"writeAuditRefresh": "sometimes"}}"#,
        );
        let err = SyncConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("rostersync.json"));
    }

    #[test]
    fn test_auto_discover() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("feeds/incoming");
        fs::create_dir_all(&nested).unwrap();
        create_temp_config(temp_dir.path(), "rostersync.yml", "processing:\n  stampAudit: false\n");

        let found = ConfigLoader::auto_discover(&nested).unwrap();
        assert!(found.is_some_and(|p| p.ends_with("rostersync.yml")));

        let config = ConfigLoader::load(None, Some(&nested)).unwrap();
        assert!(!config.processing.stamp_audit);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Some(Path::new("nonexistent.yaml")), None);
        assert!(matches!(result, Err(SyncError::Config { .. })));
    }
}

//! Compiler configuration
//!
//! Reads configuration from:
//! - `wix-dsl.yaml` / `wix-dsl.yml` / `wix-dsl.json` (project-level)
//! - `.wix-dsl.yaml` (hidden project-level)
//!
//! Missing files fall back to [`CompilerConfig::default`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Config file names tried by [`CompilerConfig::find_and_load`], in order.
pub const CONFIG_FILE_NAMES: &[&str] = &[
    "wix-dsl.yaml",
    "wix-dsl.yml",
    "wix-dsl.json",
    ".wix-dsl.yaml",
];

/// Knobs of the automatic id/element generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoGenerationOptions {
    /// Id assigned to the installation directory. `None` disables auto-assignment.
    pub install_dir_default_id: Option<String>,

    /// Map `%ProgramFiles%` and friends to their 64-bit variants for x64 projects
    pub map_64_install_dirs: bool,

    /// Use plain incremental ids for files instead of target-path hashing
    pub legacy_default_id_algorithm: bool,

    /// Append the upgrade code to generated component ids
    pub force_component_id_uniqueness: bool,

    /// Drop the default `Media` element when the project installs no files
    pub remove_media_if_no_files: bool,

    /// Skip empty directories found while resolving wildcard file sets
    pub ignore_wildcard_empty_directories: bool,

    /// File id mask of the hashed target path algorithm
    pub hashed_target_path_file_id_mask: String,

    /// Keep ids allocated before the build instead of starting from scratch
    pub do_not_reset_id_generator: bool,

    /// Accept license files without the `.rtf` extension
    pub allow_non_rtf_license: bool,

    /// Always emit conditions as CDATA
    pub force_cdata_for_conditions: bool,
}

impl Default for AutoGenerationOptions {
    fn default() -> Self {
        Self {
            install_dir_default_id: Some("INSTALLDIR".to_string()),
            map_64_install_dirs: true,
            legacy_default_id_algorithm: false,
            force_component_id_uniqueness: false,
            remove_media_if_no_files: true,
            ignore_wildcard_empty_directories: false,
            hashed_target_path_file_id_mask: "{file_name}_{dir_hash}".to_string(),
            do_not_reset_id_generator: false,
            allow_non_rtf_license: false,
            force_cdata_for_conditions: false,
        }
    }
}

/// Which WiX toolset generation to build with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolsetPreference {
    #[default]
    Auto,
    V3,
    V4,
}

impl std::str::FromStr for ToolsetPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ToolsetPreference::Auto),
            "v3" | "3" => Ok(ToolsetPreference::V3),
            "v4" | "4" | "v5" | "5" => Ok(ToolsetPreference::V4),
            _ => Err(format!("Unknown WiX toolset version: {}", s)),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Directory holding the WiX binaries. Falls back to `%WIX%\bin` and `PATH`.
    pub wix_location: Option<PathBuf>,

    /// Toolset generation
    pub wix_version: ToolsetPreference,

    /// Extra `candle` options
    pub candle_options: String,

    /// Extra `light` options
    pub light_options: String,

    /// Id/element generation settings
    pub auto_generation: AutoGenerationOptions,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            wix_location: None,
            wix_version: ToolsetPreference::Auto,
            candle_options: "-sw1026".to_string(),
            light_options: "-sw1076 -sw1079".to_string(),
            auto_generation: AutoGenerationOptions::default(),
        }
    }
}

impl CompilerConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unsupported config file extension: {}",
                    path.display()
                )))
            }
        };

        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Find a config file in `dir` and load it, or return defaults
    pub fn find_and_load(dir: &Path) -> Result<Self, ConfigError> {
        match Self::find_config_file(dir) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// First existing config file in `dir`
    pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Check the settings for values the compiler cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(id) = &self.auto_generation.install_dir_default_id {
            if id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "install_dir_default_id must not be empty (omit it to disable)".to_string(),
                ));
            }
        }

        if !self
            .auto_generation
            .hashed_target_path_file_id_mask
            .contains("{file_name}")
        {
            return Err(ConfigError::Invalid(
                "hashed_target_path_file_id_mask must contain {file_name}".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolved WiX binaries directory
    pub fn resolved_wix_location(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.wix_location {
            return Some(dir.clone());
        }

        std::env::var_os("WIX").map(|wix| PathBuf::from(wix).join("bin"))
    }

    /// Serialize as YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(
            config.auto_generation.install_dir_default_id.as_deref(),
            Some("INSTALLDIR")
        );
        assert!(config.auto_generation.map_64_install_dirs);
        assert!(!config.auto_generation.legacy_default_id_algorithm);
        assert_eq!(config.candle_options, "-sw1026");
        assert_eq!(config.light_options, "-sw1076 -sw1079");
    }

    #[test]
    fn test_load_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wix-dsl.yaml");
        fs::write(
            &path,
            "wix_version: v3\nauto_generation:\n  force_component_id_uniqueness: true\n",
        )
        .unwrap();

        let config = CompilerConfig::load(&path).unwrap();
        assert_eq!(config.wix_version, ToolsetPreference::V3);
        assert!(config.auto_generation.force_component_id_uniqueness);
        // untouched keys keep their defaults
        assert!(config.auto_generation.remove_media_if_no_files);
    }

    #[test]
    fn test_load_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wix-dsl.json");
        fs::write(&path, r#"{"light_options": "-sice:ICE61"}"#).unwrap();

        let config = CompilerConfig::load(&path).unwrap();
        assert_eq!(config.light_options, "-sice:ICE61");
    }

    #[test]
    fn test_load_unknown_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wix-dsl.toml");
        fs::write(&path, "").unwrap();

        assert!(matches!(
            CompilerConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_find_and_load_missing_is_default() {
        let temp = TempDir::new().unwrap();
        let config = CompilerConfig::find_and_load(temp.path()).unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_find_config_file_order() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("wix-dsl.json"), "{}").unwrap();
        fs::write(temp.path().join("wix-dsl.yaml"), "{}").unwrap();

        let found = CompilerConfig::find_config_file(temp.path()).unwrap();
        assert!(found.ends_with("wix-dsl.yaml"));
    }

    #[test]
    fn test_validate_rejects_bad_mask() {
        let mut config = CompilerConfig::default();
        config.auto_generation.hashed_target_path_file_id_mask = "{dir_hash}".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_install_dir_id() {
        let mut config = CompilerConfig::default();
        config.auto_generation.install_dir_default_id = Some("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toolset_preference_from_str() {
        assert_eq!("auto".parse::<ToolsetPreference>(), Ok(ToolsetPreference::Auto));
        assert_eq!("V3".parse::<ToolsetPreference>(), Ok(ToolsetPreference::V3));
        assert_eq!("5".parse::<ToolsetPreference>(), Ok(ToolsetPreference::V4));
        assert!("v9".parse::<ToolsetPreference>().is_err());
    }
}

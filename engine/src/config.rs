//! User settings shared by the GUI and the command line tool.
//!
//! Every field has a default, so a settings file only needs the values it
//! changes. Command line flags are applied on top by the caller.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::plan::{Plan, StepSizes};
use crate::stress::StressConfig;

pub const DEFAULT_SETTINGS_FILE: &str = "widget-bench.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchSettings {
    pub sizes: StepSizes,
    /// Save results after every successful full run.
    pub auto_save: bool,
    pub verbose: bool,
    pub results_dir: PathBuf,
    pub stress_iterations: i64,
    pub stress_multiplier: f64,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            sizes: StepSizes::default(),
            auto_save: true,
            verbose: false,
            results_dir: PathBuf::from("results"),
            stress_iterations: 5,
            stress_multiplier: 2.0,
        }
    }
}

impl BenchSettings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("settings loaded from {}", path.display());
        Ok(settings)
    }

    /// Load `path` when given, else the default file if present, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default = Path::new(DEFAULT_SETTINGS_FILE);
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn plan(&self) -> Plan {
        Plan::standard(&self.sizes)
    }

    pub fn stress(&self) -> Result<StressConfig, ConfigError> {
        StressConfig::new(self.plan(), self.stress_iterations, self.stress_multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"sizes": {"window_count": 7}, "auto_save": false}"#).unwrap();

        let settings = BenchSettings::load(&path).unwrap();
        assert_eq!(settings.sizes.window_count, 7);
        assert_eq!(settings.sizes.tree_items, 1000);
        assert!(!settings.auto_save);
        assert_eq!(settings.stress_iterations, 5);
    }

    #[test]
    fn bad_settings_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        for body in ["{ not json", r#"{"auto_save": "yes"}"#, r#"{"sizes": 5}"#] {
            fs::write(&path, body).unwrap();
            assert!(
                matches!(BenchSettings::load(&path), Err(ConfigError::Parse { .. })),
                "{} should not parse",
                body
            );
        }
        assert!(matches!(
            BenchSettings::discover(Some(&dir.path().join("none.json"))),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn stress_settings_are_validated() {
        let settings = BenchSettings {
            stress_iterations: 0,
            ..BenchSettings::default()
        };
        assert!(matches!(settings.stress(), Err(ConfigError::NotPositive("iterations"))));
        assert_eq!(BenchSettings::default().stress().unwrap().iterations, 5);
    }
}

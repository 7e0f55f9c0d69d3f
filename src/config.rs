use serde::Deserialize;
use std::{collections::HashMap, env, fs, path::Path};

use crate::error::ConfigError;

const ENV_MAX_RESOLUTION_DEPTH: &str = "WIREBOX_MAX_RESOLUTION_DEPTH";
const ENV_DETECT_CYCLES: &str = "WIREBOX_DETECT_CYCLES";
const ENV_PROTOTYPE_STRATEGY: &str = "WIREBOX_PROTOTYPE_STRATEGY";

/// How prototype bindings produce their instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrototypeStrategy {
    /// Run the full construction every time
    #[default]
    Rebuild,
    /// Keep the first build as a template and deep-clone it, for classes
    /// that registered a clone function; other classes still rebuild
    CloneTemplate,
}

/// Container configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Maximum nesting of `resolve` calls inside one resolution
    pub max_resolution_depth: usize,
    /// Scan the construction stack for repeated concretes before each push
    pub detect_cycles: bool,
    pub prototype_strategy: PrototypeStrategy,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_resolution_depth: 256,
            detect_cycles: true,
            prototype_strategy: PrototypeStrategy::Rebuild,
        }
    }
}

impl ContainerConfig {
    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParse("<inline>".to_string(), e))
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string_lossy().to_string(), e))?;

        let mut config: ContainerConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::TomlParse(path.to_string_lossy().to_string(), e))?;
        config.apply_env()?;

        tracing::debug!(path = %path.display(), ?config, "Loaded container configuration");
        Ok(config)
    }

    /// Apply `WIREBOX_*` environment overrides
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        let env_map = collect_env_vars();
        self.apply_env_map(&env_map)
    }

    /// Apply overrides from an already collected environment map
    pub fn apply_env_map(&mut self, env_map: &HashMap<String, String>) -> Result<(), ConfigError> {
        if let Some(value) = env_map.get(ENV_MAX_RESOLUTION_DEPTH) {
            self.max_resolution_depth = value
                .trim()
                .parse()
                .map_err(|_| invalid_env(ENV_MAX_RESOLUTION_DEPTH, value))?;
        }

        if let Some(value) = env_map.get(ENV_DETECT_CYCLES) {
            self.detect_cycles = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(invalid_env(ENV_DETECT_CYCLES, value)),
            };
        }

        if let Some(value) = env_map.get(ENV_PROTOTYPE_STRATEGY) {
            self.prototype_strategy = match value.trim() {
                "rebuild" => PrototypeStrategy::Rebuild,
                "clone_template" => PrototypeStrategy::CloneTemplate,
                _ => return Err(invalid_env(ENV_PROTOTYPE_STRATEGY, value)),
            };
        }

        Ok(())
    }
}

fn invalid_env(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Collect relevant environment variables
fn collect_env_vars() -> HashMap<String, String> {
    let env_keys = [
        ENV_MAX_RESOLUTION_DEPTH,
        ENV_DETECT_CYCLES,
        ENV_PROTOTYPE_STRATEGY,
    ];

    let mut env_map = HashMap::new();
    for key in &env_keys {
        if let Ok(value) = env::var(key) {
            env_map.insert(key.to_string(), value);
        }
    }
    env_map
}

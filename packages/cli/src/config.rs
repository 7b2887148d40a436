use anvil_blocks::{BlockTypeRegistry, IdGenerator};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "anvil.config.json";

/// Anvil CLI configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Block type registry used when `--registry` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    /// Mint `<prefix>-<n>` ids instead of random ones, for reproducible output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_prefix: Option<String>,
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Invalid {}", config_path.display()))?;
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(Config::default())
        }
    }

    /// Registry path, with an explicit path winning over the config file.
    /// Relative config paths resolve against `cwd`.
    pub fn registry_path(&self, explicit: Option<&Path>, cwd: &str) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.registry.as_ref().map(|p| PathBuf::from(cwd).join(p)))
    }

    pub fn id_generator(&self) -> IdGenerator {
        match &self.id_prefix {
            Some(prefix) => IdGenerator::sequential(prefix.clone()),
            None => IdGenerator::random(),
        }
    }
}

pub fn load_registry(path: &Path) -> anyhow::Result<BlockTypeRegistry> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read registry {}", path.display()))?;
    BlockTypeRegistry::from_json(&content)
        .with_context(|| format!("Invalid registry {}", path.display()))
}

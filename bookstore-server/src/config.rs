use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::{InventoryConfig, LockingStrategy};
use crate::replication::ReplicationConfig;

/// Main server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub inventory: InventorySection,
    pub replication: ReplicationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySection {
    pub locking: LockingStrategy,
    /// Fixed seed for editor-pick sampling; random when absent
    pub rng_seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json`, `pretty` or `compact`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.replication.validate()?;

        match self.logging.format.as_str() {
            "json" | "pretty" | "compact" => Ok(()),
            other => Err(format!(
                "logging.format must be json, pretty or compact, got {}",
                other
            )),
        }
    }

    /// Convert to InventoryConfig
    pub fn to_inventory_config(&self) -> InventoryConfig {
        InventoryConfig {
            locking: self.inventory.locking,
            rng_seed: self.inventory.rng_seed,
        }
    }

    pub fn to_replication_config(&self) -> ReplicationConfig {
        self.replication.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.inventory.locking, LockingStrategy::Coarse);
        assert!(!config.replication.enabled);
        assert_eq!(config.replication.max_replicator_threads, 10);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: ServerConfig = serde_yaml::from_str(
            "inventory:\n  locking: fine\n  rng_seed: 7\nreplication:\n  enabled: true\n  slaves: [a, b]\n",
        )
        .unwrap();

        let inventory = config.to_inventory_config();
        assert_eq!(inventory.locking, LockingStrategy::Fine);
        assert_eq!(inventory.rng_seed, Some(7));
        assert_eq!(config.to_replication_config().active_slaves(), ["a", "b"]);
        assert_eq!(config.replication.max_replicator_threads, 10);
        assert_eq!(config.logging.format, "compact");
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = ServerConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Replication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Enable replication
    pub enabled: bool,

    /// Maximum number of replication RPCs in flight at once
    pub max_replicator_threads: usize,

    /// Slave endpoints that receive every committed write
    pub slaves: Vec<String>,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_replicator_threads: 10,
            slaves: Vec::new(),
        }
    }
}

impl ReplicationConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }

        if self.max_replicator_threads == 0 {
            return Err("max_replicator_threads must be at least 1".to_string());
        }

        let mut seen = HashSet::new();
        for slave in &self.slaves {
            if slave.trim().is_empty() {
                return Err("slave endpoints must not be empty".to_string());
            }
            if !seen.insert(slave.as_str()) {
                return Err(format!("slave endpoint {} is listed twice", slave));
            }
        }

        Ok(())
    }

    /// Slaves that should receive writes, empty when replication is off
    pub fn active_slaves(&self) -> &[String] {
        if self.enabled { self.slaves.as_slice() } else { &[] }
    }
}

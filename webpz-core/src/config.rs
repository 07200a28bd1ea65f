use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WebpzError};
use crate::pack::writer::PackOptions;
use crate::policy::Policy;

/// Session configuration; every field may be omitted in the JSON file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub policy: Policy,
    /// Concurrent transcodes; defaults to the number of logical cores.
    pub workers: Option<usize>,
    pub pack: PackOptions,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let cfg: Config = serde_json::from_str(&text)
            .map_err(|e| WebpzError::Config(format!("{}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        if self.workers == Some(0) {
            return Err(WebpzError::Config("workers must be at least 1".into()));
        }
        self.pack.validate()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

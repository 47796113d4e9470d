//! Planner configuration, read from a TOML file with environment overrides.
//!
//! ```toml
//! data_dir = "data"
//! dataset_file = "campaigns.csv"
//! session_idle_minutes = 120
//!
//! [allocation]
//! preference_boost = 0.20
//! min_share = 0.15
//! max_share = 0.85
//! rounding_step = 100
//! ```
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::allocation::AllocationPolicy;
use crate::error::PlannerError;

pub const ENV_DATA_DIR: &str = "MEDIA_PLANNER_DATA_DIR";
pub const ENV_DATASET: &str = "MEDIA_PLANNER_DATASET";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Directory the dataset file is resolved against
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_dataset_file")]
    pub dataset_file: String,

    /// Sessions untouched for this long may be pruned
    #[serde(default = "default_session_idle_minutes")]
    pub session_idle_minutes: i64,

    #[serde(default)]
    pub allocation: AllocationPolicy,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_dataset_file() -> String {
    "campaigns.csv".into()
}

fn default_session_idle_minutes() -> i64 {
    120
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            dataset_file: default_dataset_file(),
            session_idle_minutes: default_session_idle_minutes(),
            allocation: AllocationPolicy::default(),
        }
    }
}

impl PlannerConfig {
    /// Load from `path`, falling back to defaults when the file is absent,
    /// then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, PlannerError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml_str(&content)?
        } else {
            info!("No config file found at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, PlannerError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Override file values with `lookup(ENV_DATA_DIR)` / `lookup(ENV_DATASET)`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup(ENV_DATASET) {
            self.dataset_file = file;
        }
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.dataset_file.trim().is_empty() {
            return Err(PlannerError::Config("dataset_file must not be empty".into()));
        }
        if self.session_idle_minutes <= 0 {
            return Err(PlannerError::Config(
                "session_idle_minutes must be positive".into(),
            ));
        }
        self.allocation.validate()
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(&self.dataset_file)
    }

    pub fn session_idle(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_idle_minutes)
    }
}

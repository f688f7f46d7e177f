//! Run configuration loaded from TOML.
//!
//! Every section is optional; missing values fall back to defaults, so a file
//! only needs to name what differs. Timestamps are RFC 3339 strings:
//!
//! ```toml
//! [job]
//! beginning = "2020-01-01T00:00:00Z"
//! end = "2020-01-02T00:00:00Z"
//! grid_areas = ["500", "501"]
//! process_type = "D04"
//! result_id = "run-42"
//!
//! [input]
//! readings = "data/readings.csv"
//! responsibilities = "data/grid_loss_sys_cor.csv"
//!
//! [coordinator]
//! enabled = true
//! result_url = "http://localhost:7071/api/ResultReceiver"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settle_algo::SettlementConfig;
use settle_core::{ConnectionState, ProcessType, ReadingQuery, Resolution};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    pub job: JobConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub coordinator: CoordinatorConfig,
    pub runtime: RuntimeConfig,
}

/// What to settle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Start of the settled period (inclusive).
    pub beginning: Option<DateTime<Utc>>,
    /// End of the settled period (exclusive).
    pub end: Option<DateTime<Utc>>,
    /// Empty means every grid area in the input.
    pub grid_areas: Vec<String>,
    pub process_type: ProcessType,
    /// Identifier echoed back to the coordinator with every result.
    pub result_id: String,
    pub resolution: Resolution,
    /// Connection states admitted into settlement.
    pub connection_states: Vec<ConnectionState>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            beginning: None,
            end: None,
            grid_areas: Vec::new(),
            process_type: ProcessType::default(),
            result_id: String::new(),
            resolution: Resolution::default(),
            connection_states: vec![ConnectionState::Connected],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Readings CSV.
    pub readings: Option<PathBuf>,
    /// Grid-loss / system-correction responsibility CSV.
    pub responsibilities: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory under which `Results/<stamp>/` is created.
    pub root: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub enabled: bool,
    pub result_url: Option<String>,
    pub snapshot_url: Option<String>,
    /// Request timeout in seconds (0 = no timeout).
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = auto-detect).
    pub threads: usize,
}

impl SettleConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing config '{}'", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SettleConfig = toml::from_str(text)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing config")
    }

    /// Check that the settled period and inputs are present and consistent.
    pub fn validate(&self) -> Result<()> {
        let (Some(beginning), Some(end)) = (self.job.beginning, self.job.end) else {
            bail!("job.beginning and job.end are required");
        };
        if end <= beginning {
            bail!("job.end {end} is not after job.beginning {beginning}");
        }
        if self.input.readings.is_none() {
            bail!("input.readings is required");
        }
        if self.job.connection_states.is_empty() {
            bail!("job.connection_states admits nothing");
        }
        if self.coordinator.enabled {
            if self.coordinator.result_url.is_none() {
                bail!("coordinator.result_url is required when the coordinator is enabled");
            }
            if self.job.result_id.trim().is_empty() {
                bail!("job.result_id is required when the coordinator is enabled");
            }
        }
        Ok(())
    }

    pub fn reading_query(&self) -> Result<ReadingQuery> {
        let (Some(beginning), Some(end)) = (self.job.beginning, self.job.end) else {
            bail!("job.beginning and job.end are required");
        };
        let query = ReadingQuery::new(beginning, end)?.with_grid_areas(self.job.grid_areas.iter().cloned());
        Ok(query)
    }

    pub fn settlement_config(&self) -> SettlementConfig {
        SettlementConfig {
            width: self.job.resolution.into(),
            connection_states: self.job.connection_states.iter().copied().collect(),
            ..SettlementConfig::default()
        }
    }
}

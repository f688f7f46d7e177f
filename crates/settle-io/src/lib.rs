//! # settle-io: Inputs, Outputs and Configuration
//!
//! Everything that touches the filesystem or the network around a settlement run:
//!
//! - [`CsvReadingSource`] / [`CsvMasterDataSource`] - CSV inputs behind the core source traits
//! - period partitions and master-data events as JSON ([`read_periods_json`], [`read_events_json`])
//! - [`JsonFilePublisher`] - one newline-delimited JSON file per result table
//! - [`CoordinatorClient`] - HTTP notification of each published table
//! - [`SettleConfig`] - TOML run configuration

pub mod config;
pub mod coordinator;
pub mod master_data;
pub mod postprocess;
pub mod publish;
pub mod readings;

pub use config::{
    CoordinatorConfig, InputConfig, JobConfig, OutputConfig, RuntimeConfig, SettleConfig,
};
pub use coordinator::{CoordinatorClient, LogNotifier};
pub use master_data::{
    read_events_json, read_periods_json, read_responsibilities_csv, write_periods_json,
    CsvMasterDataSource,
};
pub use postprocess::publish_all;
pub use publish::{row_to_json, run_stamp, JsonFilePublisher, RESULTS_DIR};
pub use readings::{read_readings_csv, write_readings_csv, CsvReadingSource};

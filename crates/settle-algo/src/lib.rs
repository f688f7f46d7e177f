//! # settle-algo: Settlement Calculations
//!
//! Pure transformations over the settlement tables of `settle-core`:
//!
//! - [`aggregate`] / [`aggregate_parallel`] - readings into windowed sums
//! - [`net_exchange_per_neighbour`] / [`net_exchange_per_grid_area`] - exchange netting
//! - [`compute_grid_loss`] - residual per grid area and window
//! - [`apportion`] - put grid loss / system correction onto the designated party
//! - [`combine`] - total consumption per grid area
//! - [`run_settlement`] - every step of a run, in order
//!
//! None of these perform I/O; sources and publishers live in `settle-io`.

pub mod aggregate;
pub mod apportion;
pub mod exchange;
pub mod grid_loss;
pub mod pipeline;
pub mod total;

pub use aggregate::{aggregate, aggregate_parallel, regroup, AggregationSpec};
pub use apportion::{apportion, apportion_with_intervals, attribute_adjustments};
pub use exchange::{net_exchange_per_grid_area, net_exchange_per_neighbour, ExchangeSpec};
pub use grid_loss::{added_grid_loss, added_system_correction, compute_grid_loss};
pub use pipeline::{run_settlement, NamedTable, SettlementConfig, SettlementResults};
pub use total::combine;

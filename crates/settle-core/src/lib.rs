//! # settle-core: Grid-Area Settlement Model
//!
//! Shared vocabulary for the settlement crates: readings, aggregate rows,
//! responsibility master data, time-bounded entity periods, the market
//! codelists they carry, and the quality reconciliation rule every
//! aggregation step applies.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use rust_decimal::Decimal;
//! use settle_core::*;
//!
//! let reading = Reading::new(
//!     "571313180000000001",
//!     "500",
//!     PointType::Production,
//!     Decimal::new(125, 1),
//!     Utc.with_ymd_and_hms(2020, 1, 1, 0, 15, 0).unwrap(),
//! )
//! .with_parties("BRP1", "ES1");
//!
//! let window = WindowWidth::hourly().window_for(reading.observed_at).unwrap();
//! assert_eq!(window.start, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
//! assert_eq!(reconcile(Quality::AsRead, Quality::QuantityMissing), Quality::Estimated);
//! ```
//!
//! ## Core Data Structures
//!
//! - [`Reading`] - one metering-point observation
//! - [`AggregateRow`] - summed quantity per [`GroupKey`] and [`TimeWindow`]
//! - [`ResponsibilityInterval`] - party designated for grid loss / system correction
//! - [`EntityPeriod`] / [`AttributeChangeEvent`] - bitemporal master data

pub mod attributes;
pub mod boundary;
pub mod codes;
pub mod error;
pub mod model;
pub mod quality;
pub mod time;

pub use attributes::{AttributeChangeEvent, AttributeKey, AttributeValue, Attributes, EntityPeriod};
pub use boundary::{
    MasterDataSource, Notifier, PublishedLocation, ReadingQuery, ReadingSource, ResultPublisher,
    ResultTable,
};
pub use codes::{ConnectionState, PointType, ProcessType, Quality, Resolution, SettlementMethod};
pub use error::{SettleError, SettleResult};
pub use model::{
    checked_add, checked_sub, AdjustmentRow, AggregateRow, AttributedAdjustment, ExchangeRow,
    GridLossRow, GroupKey, Grouping, Reading, ResponsibilityFlag, ResponsibilityInterval,
};
pub use quality::{reconcile, reconcile_all, QualityFold};
pub use time::{sentinel_end, TimeWindow, WindowWidth};

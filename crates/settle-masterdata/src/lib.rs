//! # settle-masterdata: Time-Bounded Master Data
//!
//! Two kinds of master data feed a settlement run:
//!
//! - [`ResponsibilityIndex`] answers "which party carries grid loss or system
//!   correction for this grid area during this window", rejecting
//!   overlapping designations up front.
//! - [`PeriodStore`] keeps each metering point's attributes as a contiguous
//!   sequence of validity periods and applies change events to it with
//!   [`apply_change`].

pub mod events;
pub mod period;
pub mod responsibility;
pub mod schema;

pub use events::{dispatch_all, DispatchSummary, EventOutcome, MasterDataEvent, PeriodStore};
pub use period::{apply_change, apply_change_with_kind, check_partition, period_at, MutationKind};
pub use responsibility::ResponsibilityIndex;
pub use schema::{AttributeSchema, RawAttributeChange, ValueKind};

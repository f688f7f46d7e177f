//! Interfaces to the collaborators that feed and consume the settlement core.
//!
//! Sources hand over plain tables, publishers receive finished tables by
//! logical name, and notifiers tell a coordinating service where a result
//! landed. Storage formats and transports live in implementations of these
//! traits (see `settle-io`), never in the core.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{SettleError, SettleResult};
use crate::model::{
    AdjustmentRow, AggregateRow, AttributedAdjustment, ExchangeRow, GridLossRow, Reading,
    ResponsibilityInterval,
};

/// Selects readings by grid area and observation time `[beginning, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingQuery {
    /// Empty means every grid area.
    pub grid_areas: BTreeSet<String>,
    pub beginning: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReadingQuery {
    pub fn new(beginning: DateTime<Utc>, end: DateTime<Utc>) -> SettleResult<Self> {
        if end <= beginning {
            return Err(SettleError::Validation(format!(
                "reading period end {end} is not after beginning {beginning}"
            )));
        }
        Ok(Self {
            grid_areas: BTreeSet::new(),
            beginning,
            end,
        })
    }

    pub fn with_grid_areas<I, S>(mut self, grid_areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grid_areas = grid_areas.into_iter().map(Into::into).collect();
        self
    }

    pub fn admits(&self, reading: &Reading) -> bool {
        let in_period = self.beginning <= reading.observed_at && reading.observed_at < self.end;
        let in_area = self.grid_areas.is_empty() || self.grid_areas.contains(&reading.grid_area);
        in_period && in_area
    }
}

pub trait ReadingSource {
    fn readings(&self, query: &ReadingQuery) -> SettleResult<Vec<Reading>>;
}

pub trait MasterDataSource {
    fn responsibility_intervals(&self) -> SettleResult<Vec<ResponsibilityInterval>>;
}

/// A produced table, ready to be handed to a publisher.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultTable {
    Aggregates(Vec<AggregateRow>),
    Exchange(Vec<ExchangeRow>),
    GridLoss(Vec<GridLossRow>),
    Adjustments(Vec<AdjustmentRow>),
    Attributed(Vec<AttributedAdjustment>),
}

impl ResultTable {
    pub fn len(&self) -> usize {
        match self {
            ResultTable::Aggregates(rows) => rows.len(),
            ResultTable::Exchange(rows) => rows.len(),
            ResultTable::GridLoss(rows) => rows.len(),
            ResultTable::Adjustments(rows) => rows.len(),
            ResultTable::Attributed(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a publisher put a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedLocation {
    pub name: String,
    pub path: String,
    pub rows: usize,
}

pub trait ResultPublisher {
    fn publish(&self, name: &str, table: &ResultTable) -> SettleResult<PublishedLocation>;
}

pub trait Notifier {
    fn notify(&self, location: &PublishedLocation) -> SettleResult<()>;
}

//! Settlement tables: readings in, aggregates and adjustments out.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::codes::{ConnectionState, PointType, Quality, SettlementMethod};
use crate::error::{SettleError, SettleResult};
use crate::time::TimeWindow;

/// Add two quantities, surfacing overflow with the caller's context.
pub fn checked_add<F>(a: Decimal, b: Decimal, context: F) -> SettleResult<Decimal>
where
    F: FnOnce() -> String,
{
    a.checked_add(b)
        .ok_or_else(|| SettleError::QuantityOverflow { context: context() })
}

/// Subtract two quantities, surfacing overflow with the caller's context.
pub fn checked_sub<F>(a: Decimal, b: Decimal, context: F) -> SettleResult<Decimal>
where
    F: FnOnce() -> String,
{
    a.checked_sub(b)
        .ok_or_else(|| SettleError::QuantityOverflow { context: context() })
}

/// A single time-series observation from one metering point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(default)]
    pub metering_point_id: String,
    pub grid_area: String,
    #[serde(default)]
    pub responsible_party: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    pub point_type: PointType,
    #[serde(default)]
    pub settlement_method: Option<SettlementMethod>,
    pub connection_state: ConnectionState,
    /// Receiving grid area of an exchange point.
    #[serde(default)]
    pub in_grid_area: Option<String>,
    /// Delivering grid area of an exchange point.
    #[serde(default)]
    pub out_grid_area: Option<String>,
    pub quantity: Decimal,
    pub observed_at: DateTime<Utc>,
    pub quality: Quality,
}

impl Reading {
    /// A connected, as-read reading without party or exchange information.
    pub fn new(
        metering_point_id: impl Into<String>,
        grid_area: impl Into<String>,
        point_type: PointType,
        quantity: Decimal,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            metering_point_id: metering_point_id.into(),
            grid_area: grid_area.into(),
            responsible_party: None,
            supplier: None,
            point_type,
            settlement_method: None,
            connection_state: ConnectionState::Connected,
            in_grid_area: None,
            out_grid_area: None,
            quantity,
            observed_at,
            quality: Quality::AsRead,
        }
    }

    pub fn with_parties(
        mut self,
        responsible_party: impl Into<String>,
        supplier: impl Into<String>,
    ) -> Self {
        self.responsible_party = Some(responsible_party.into());
        self.supplier = Some(supplier.into());
        self
    }

    pub fn with_settlement_method(mut self, method: SettlementMethod) -> Self {
        self.settlement_method = Some(method);
        self
    }

    pub fn with_connection_state(mut self, state: ConnectionState) -> Self {
        self.connection_state = state;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_exchange(mut self, in_grid_area: impl Into<String>, out_grid_area: impl Into<String>) -> Self {
        self.in_grid_area = Some(in_grid_area.into());
        self.out_grid_area = Some(out_grid_area.into());
        self
    }
}

/// Which party columns take part in grouping. The grid area always does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    GridArea,
    GridAreaSupplier,
    GridAreaResponsible,
    GridAreaResponsibleSupplier,
}

impl Grouping {
    pub fn key(
        &self,
        grid_area: &str,
        responsible_party: Option<&str>,
        supplier: Option<&str>,
    ) -> GroupKey {
        let (brp, es) = match self {
            Grouping::GridArea => (None, None),
            Grouping::GridAreaSupplier => (None, supplier),
            Grouping::GridAreaResponsible => (responsible_party, None),
            Grouping::GridAreaResponsibleSupplier => (responsible_party, supplier),
        };
        GroupKey {
            grid_area: grid_area.to_string(),
            responsible_party: brp.map(str::to_string),
            supplier: es.map(str::to_string),
        }
    }
}

/// Grouping columns of an aggregate row; ordering is grid area, BRP, supplier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub grid_area: String,
    pub responsible_party: Option<String>,
    pub supplier: Option<String>,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grid area {}", self.grid_area)?;
        if let Some(brp) = &self.responsible_party {
            write!(f, ", BRP {brp}")?;
        }
        if let Some(es) = &self.supplier {
            write!(f, ", supplier {es}")?;
        }
        Ok(())
    }
}

/// One summed quantity per group key and time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub grid_area: String,
    pub responsible_party: Option<String>,
    pub supplier: Option<String>,
    pub time_window: TimeWindow,
    pub sum_quantity: Decimal,
    pub quality: Quality,
}

impl AggregateRow {
    pub fn new(key: GroupKey, time_window: TimeWindow, sum_quantity: Decimal, quality: Quality) -> Self {
        Self {
            grid_area: key.grid_area,
            responsible_party: key.responsible_party,
            supplier: key.supplier,
            time_window,
            sum_quantity,
            quality,
        }
    }

    pub fn key(&self) -> GroupKey {
        GroupKey {
            grid_area: self.grid_area.clone(),
            responsible_party: self.responsible_party.clone(),
            supplier: self.supplier.clone(),
        }
    }

    pub fn grid_key(&self) -> (String, TimeWindow) {
        (self.grid_area.clone(), self.time_window)
    }
}

/// Net exchange of a grid area, either towards one neighbour or in total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRow {
    pub grid_area: String,
    /// `None` for the per-grid-area total.
    pub neighbour_grid_area: Option<String>,
    pub time_window: TimeWindow,
    pub in_sum: Decimal,
    pub out_sum: Decimal,
    pub sum_quantity: Decimal,
    pub quality: Quality,
}

impl ExchangeRow {
    pub fn to_aggregate(&self) -> AggregateRow {
        AggregateRow {
            grid_area: self.grid_area.clone(),
            responsible_party: None,
            supplier: None,
            time_window: self.time_window,
            sum_quantity: self.sum_quantity,
            quality: self.quality,
        }
    }
}

/// Signed imbalance of a grid area in one window. Positive means surplus supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLossRow {
    pub grid_area: String,
    pub time_window: TimeWindow,
    pub grid_loss: Decimal,
}

impl GridLossRow {
    /// `max(0, -grid_loss)`
    pub fn added_system_correction(&self) -> Decimal {
        if self.grid_loss.is_sign_negative() {
            -self.grid_loss
        } else {
            Decimal::ZERO
        }
    }

    /// `max(0, grid_loss)`
    pub fn added_grid_loss(&self) -> Decimal {
        if self.grid_loss > Decimal::ZERO {
            self.grid_loss
        } else {
            Decimal::ZERO
        }
    }
}

/// Kind of responsibility a party carries for a grid area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResponsibilityFlag {
    #[serde(rename = "is_system_correction")]
    SystemCorrection,
    #[serde(rename = "is_grid_loss")]
    GridLoss,
}

impl fmt::Display for ResponsibilityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponsibilityFlag::SystemCorrection => f.write_str("system correction"),
            ResponsibilityFlag::GridLoss => f.write_str("grid loss"),
        }
    }
}

/// Master-data row designating a party responsible for a grid area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsibilityInterval {
    pub party: String,
    pub grid_area: String,
    pub flag: ResponsibilityFlag,
    pub from_date: DateTime<Utc>,
    /// `None` means open-ended.
    #[serde(default)]
    pub to_date: Option<DateTime<Utc>>,
}

impl ResponsibilityInterval {
    /// True when the whole window lies inside the interval.
    pub fn covers(&self, window: &TimeWindow) -> bool {
        self.from_date <= window.start && self.to_date.map_or(true, |to| window.end <= to)
    }

    /// True when both intervals share at least one instant.
    pub fn overlaps(&self, other: &ResponsibilityInterval) -> bool {
        let self_before_other_ends = other.to_date.map_or(true, |to| self.from_date < to);
        let other_before_self_ends = self.to_date.map_or(true, |to| other.from_date < to);
        self_before_other_ends && other_before_self_ends
    }
}

/// A quantity to be added onto the party responsible for a grid area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRow {
    pub grid_area: String,
    pub time_window: TimeWindow,
    pub flag: ResponsibilityFlag,
    pub quantity: Decimal,
}

/// An adjustment joined with the party designated for it (if any).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributedAdjustment {
    pub grid_area: String,
    pub time_window: TimeWindow,
    pub flag: ResponsibilityFlag,
    pub party: Option<String>,
    pub quantity: Decimal,
}

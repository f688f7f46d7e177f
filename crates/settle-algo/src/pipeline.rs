//! The full settlement run, from readings to every published table.
//!
//! Steps follow the market process numbering:
//!
//! | step | table |
//! |------|-------|
//! | 1 | `net_exchange_per_neighbour` |
//! | 2 | `net_exchange_per_ga` |
//! | 3 | `hourly_consumption` |
//! | 4 | `flex_consumption` |
//! | 5 | `hourly_production` |
//! | 6 | `grid_loss` |
//! | 8 | `added_system_correction` |
//! | 9 | `added_grid_loss` |
//! | - | `combined_system_correction`, `combined_grid_loss` |
//! | 10 | `flex_consumption_with_grid_loss` |
//! | 11 | `hourly_production_with_system_correction_and_grid_loss` |
//! | 12-14 | `*_ga_es` |
//! | 15-17 | `*_ga_brp` |
//! | 18-20 | `*_ga` |
//! | 21 | `total_consumption` |
//! | 22 | `residual_ga` |
//!
//! Aggregation of readings (steps 1-5) is the only stage that touches the
//! reading volume; everything downstream works on aggregate rows.

use std::collections::BTreeSet;

use serde::Serialize;
use settle_core::{
    AggregateRow, ConnectionState, ExchangeRow, Grouping, Reading, ResponsibilityFlag,
    ResponsibilityInterval, ResultTable, SettleResult, WindowWidth,
};
use settle_masterdata::ResponsibilityIndex;
use tracing::info;

use crate::aggregate::{aggregate, aggregate_parallel, regroup, AggregationSpec};
use crate::apportion::{apportion, attribute_adjustments};
use crate::exchange::{net_exchange_per_grid_area, net_exchange_per_neighbour, ExchangeSpec};
use crate::grid_loss::{added_grid_loss, added_system_correction, compute_grid_loss};
use crate::total::combine;

/// Knobs of a settlement run. Passed explicitly; the pipeline reads nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementConfig {
    pub width: WindowWidth,
    /// Connection states that take part in settlement.
    pub connection_states: BTreeSet<ConnectionState>,
    /// Aggregate readings with one rayon task per grid area.
    pub parallel: bool,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            width: WindowWidth::hourly(),
            connection_states: [ConnectionState::Connected].into_iter().collect(),
            parallel: true,
        }
    }
}

impl SettlementConfig {
    fn spec(&self, base: AggregationSpec) -> AggregationSpec {
        base.with_width(self.width)
            .with_connection_states(self.connection_states.iter().copied())
    }

    fn exchange_spec(&self) -> ExchangeSpec {
        ExchangeSpec {
            connection_states: self.connection_states.clone(),
            width: self.width,
        }
    }

    fn aggregate(&self, readings: &[Reading], base: AggregationSpec) -> SettleResult<Vec<AggregateRow>> {
        let spec = self.spec(base);
        if self.parallel {
            aggregate_parallel(readings, &spec)
        } else {
            aggregate(readings, &spec)
        }
    }
}

/// One produced table under its logical name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedTable {
    pub step: Option<u8>,
    pub name: &'static str,
    pub table: ResultTable,
}

/// Every table of a run, in step order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettlementResults {
    pub tables: Vec<NamedTable>,
}

impl SettlementResults {
    fn push(&mut self, step: Option<u8>, name: &'static str, table: ResultTable) {
        self.tables.push(NamedTable { step, name, table });
    }

    pub fn get(&self, name: &str) -> Option<&ResultTable> {
        self.tables
            .iter()
            .find(|named| named.name == name)
            .map(|named| &named.table)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables.iter().map(|named| named.name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|named| named.table.len()).sum()
    }
}

fn as_aggregates(rows: &[ExchangeRow]) -> Vec<AggregateRow> {
    rows.iter().map(ExchangeRow::to_aggregate).collect()
}

/// Run every settlement step over one batch of readings.
///
/// Responsibility intervals are validated up front; an overlapping
/// designation aborts the run before any table is produced.
pub fn run_settlement(
    readings: &[Reading],
    intervals: &[ResponsibilityInterval],
    config: &SettlementConfig,
) -> SettleResult<SettlementResults> {
    let system_correction_index = ResponsibilityIndex::build(intervals, ResponsibilityFlag::SystemCorrection)?;
    let grid_loss_index = ResponsibilityIndex::build(intervals, ResponsibilityFlag::GridLoss)?;

    let mut results = SettlementResults::default();

    // Steps 1-5: readings to aggregates
    let exchange_spec = config.exchange_spec();
    let per_neighbour = net_exchange_per_neighbour(readings, &exchange_spec)?;
    let per_ga = net_exchange_per_grid_area(readings, &exchange_spec)?;
    let net_exchange = as_aggregates(&per_ga);
    let hourly_consumption = config.aggregate(readings, AggregationSpec::hourly_consumption())?;
    let flex_consumption = config.aggregate(readings, AggregationSpec::flex_consumption())?;
    let hourly_production = config.aggregate(readings, AggregationSpec::hourly_production())?;

    // Steps 6, 8, 9
    let grid_loss = compute_grid_loss(&net_exchange, &hourly_consumption, &flex_consumption, &hourly_production)?;
    let system_correction = added_system_correction(&grid_loss);
    let added_loss = added_grid_loss(&grid_loss);
    let combined_system_correction = attribute_adjustments(&system_correction, &system_correction_index);
    let combined_grid_loss = attribute_adjustments(&added_loss, &grid_loss_index);

    // Steps 10-11
    let flex_with_loss = apportion(&flex_consumption, &added_loss, &grid_loss_index)?;
    let production_with_correction = apportion(&hourly_production, &system_correction, &system_correction_index)?;

    // Steps 12-20
    const PER_PARTY: [(Grouping, [&str; 3]); 3] = [
        (
            Grouping::GridAreaSupplier,
            [
                "hourly_production_ga_es",
                "hourly_settled_consumption_ga_es",
                "flex_settled_consumption_ga_es",
            ],
        ),
        (
            Grouping::GridAreaResponsible,
            [
                "hourly_production_ga_brp",
                "hourly_settled_consumption_ga_brp",
                "flex_settled_consumption_ga_brp",
            ],
        ),
        (
            Grouping::GridArea,
            [
                "hourly_production_ga",
                "hourly_settled_consumption_ga",
                "flex_settled_consumption_ga",
            ],
        ),
    ];
    let mut per_party: Vec<(&'static str, Vec<AggregateRow>)> = Vec::with_capacity(9);
    for (grouping, [production_name, consumption_name, flex_name]) in PER_PARTY {
        per_party.push((production_name, regroup(&production_with_correction, grouping)?));
        per_party.push((consumption_name, regroup(&hourly_consumption, grouping)?));
        per_party.push((flex_name, regroup(&flex_with_loss, grouping)?));
    }

    // Steps 21-22 work on the grid-area level tables (18-20)
    let production_ga = &per_party[6].1;
    let consumption_ga = &per_party[7].1;
    let flex_ga = &per_party[8].1;
    let total_consumption = combine(&net_exchange, production_ga)?;
    let residual = compute_grid_loss(&net_exchange, consumption_ga, flex_ga, production_ga)?;

    results.push(Some(1), "net_exchange_per_neighbour", ResultTable::Exchange(per_neighbour));
    results.push(Some(2), "net_exchange_per_ga", ResultTable::Exchange(per_ga));
    results.push(Some(3), "hourly_consumption", ResultTable::Aggregates(hourly_consumption));
    results.push(Some(4), "flex_consumption", ResultTable::Aggregates(flex_consumption));
    results.push(Some(5), "hourly_production", ResultTable::Aggregates(hourly_production));
    results.push(Some(6), "grid_loss", ResultTable::GridLoss(grid_loss));
    results.push(Some(8), "added_system_correction", ResultTable::Adjustments(system_correction));
    results.push(Some(9), "added_grid_loss", ResultTable::Adjustments(added_loss));
    results.push(None, "combined_system_correction", ResultTable::Attributed(combined_system_correction));
    results.push(None, "combined_grid_loss", ResultTable::Attributed(combined_grid_loss));
    results.push(Some(10), "flex_consumption_with_grid_loss", ResultTable::Aggregates(flex_with_loss));
    results.push(
        Some(11),
        "hourly_production_with_system_correction_and_grid_loss",
        ResultTable::Aggregates(production_with_correction),
    );
    for (step, (name, rows)) in (12u8..).zip(per_party) {
        results.push(Some(step), name, ResultTable::Aggregates(rows));
    }
    results.push(Some(21), "total_consumption", ResultTable::Aggregates(total_consumption));
    results.push(Some(22), "residual_ga", ResultTable::GridLoss(residual));

    info!(
        readings = readings.len(),
        tables = results.len(),
        rows = results.total_rows(),
        "settlement run complete"
    );
    Ok(results)
}

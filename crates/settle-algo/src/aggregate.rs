//! Windowed aggregation of readings into settlement rows.
//!
//! Readings are filtered (point type, settlement method, connection state),
//! bucketed into fixed-width windows anchored at the epoch, grouped by the
//! requested party columns and summed with exact decimal arithmetic. Quality
//! is reconciled across every reading folded into a group.
//!
//! Output is ordered by group key then window. A `BTreeMap` accumulator gives
//! that order for free; the parallel variant partitions by grid area (the
//! leading key column) and concatenates the partitions in grid-area order.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use rust_decimal::Decimal;
use settle_core::{
    checked_add, AggregateRow, ConnectionState, GroupKey, Grouping, PointType, Quality,
    QualityFold, Reading, SettleResult, SettlementMethod, TimeWindow, WindowWidth,
};
use tracing::debug;

/// Which readings to aggregate and how to group them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationSpec {
    pub point_type: PointType,
    /// `None` admits every settlement method (and readings without one).
    pub settlement_method: Option<SettlementMethod>,
    /// Connection states that qualify for settlement.
    pub connection_states: BTreeSet<ConnectionState>,
    pub grouping: Grouping,
    pub width: WindowWidth,
}

impl AggregationSpec {
    /// Connected meters only, hourly windows.
    pub fn new(point_type: PointType, grouping: Grouping) -> Self {
        Self {
            point_type,
            settlement_method: None,
            connection_states: [ConnectionState::Connected].into_iter().collect(),
            grouping,
            width: WindowWidth::hourly(),
        }
    }

    /// Non-profiled consumption per grid area, BRP and supplier.
    pub fn hourly_consumption() -> Self {
        Self::new(PointType::Consumption, Grouping::GridAreaResponsibleSupplier)
            .with_settlement_method(SettlementMethod::NonProfiled)
    }

    /// Flex-settled consumption per grid area, BRP and supplier.
    pub fn flex_consumption() -> Self {
        Self::new(PointType::Consumption, Grouping::GridAreaResponsibleSupplier)
            .with_settlement_method(SettlementMethod::Flex)
    }

    /// Production per grid area, BRP and supplier.
    pub fn hourly_production() -> Self {
        Self::new(PointType::Production, Grouping::GridAreaResponsibleSupplier)
    }

    pub fn with_settlement_method(mut self, method: SettlementMethod) -> Self {
        self.settlement_method = Some(method);
        self
    }

    pub fn with_connection_states<I>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = ConnectionState>,
    {
        self.connection_states = states.into_iter().collect();
        self
    }

    pub fn with_width(mut self, width: WindowWidth) -> Self {
        self.width = width;
        self
    }

    pub fn admits(&self, reading: &Reading) -> bool {
        reading.point_type == self.point_type
            && self.connection_states.contains(&reading.connection_state)
            && self
                .settlement_method
                .map_or(true, |method| reading.settlement_method == Some(method))
    }
}

/// Running sum and quality of one output row.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Bucket {
    pub sum: Decimal,
    pub quality: QualityFold,
}

impl Bucket {
    pub fn add<F>(&mut self, quantity: Decimal, quality: Quality, context: F) -> SettleResult<()>
    where
        F: FnOnce() -> String,
    {
        self.sum = checked_add(self.sum, quantity, context)?;
        self.quality.push(quality);
        Ok(())
    }

    /// Reconciled quality; an empty bucket never reaches output.
    pub fn quality(&self) -> Quality {
        self.quality.get().unwrap_or(Quality::AsRead)
    }
}

/// Aggregate readings sequentially.
pub fn aggregate(readings: &[Reading], spec: &AggregationSpec) -> SettleResult<Vec<AggregateRow>> {
    let admitted: Vec<&Reading> = readings.iter().filter(|r| spec.admits(r)).collect();
    let rows = aggregate_admitted(&admitted, spec)?;
    debug!(
        point_type = %spec.point_type,
        readings = readings.len(),
        admitted = admitted.len(),
        rows = rows.len(),
        "aggregated readings"
    );
    Ok(rows)
}

/// Aggregate readings with one rayon task per grid area.
///
/// Produces exactly the rows of [`aggregate`], in the same order.
pub fn aggregate_parallel(
    readings: &[Reading],
    spec: &AggregationSpec,
) -> SettleResult<Vec<AggregateRow>> {
    let mut partitions: BTreeMap<&str, Vec<&Reading>> = BTreeMap::new();
    for reading in readings.iter().filter(|r| spec.admits(r)) {
        partitions
            .entry(reading.grid_area.as_str())
            .or_default()
            .push(reading);
    }

    let partitions: Vec<(&str, Vec<&Reading>)> = partitions.into_iter().collect();
    let per_area: Vec<SettleResult<Vec<AggregateRow>>> = partitions
        .par_iter()
        .map(|(_, admitted)| aggregate_admitted(admitted, spec))
        .collect();

    let mut rows = Vec::new();
    for partition in per_area {
        rows.extend(partition?);
    }
    debug!(
        point_type = %spec.point_type,
        grid_areas = partitions.len(),
        rows = rows.len(),
        "aggregated readings in parallel"
    );
    Ok(rows)
}

fn aggregate_admitted(readings: &[&Reading], spec: &AggregationSpec) -> SettleResult<Vec<AggregateRow>> {
    let mut buckets: BTreeMap<(GroupKey, TimeWindow), Bucket> = BTreeMap::new();
    for reading in readings {
        let window = spec.width.window_for(reading.observed_at)?;
        let key = spec.grouping.key(
            &reading.grid_area,
            reading.responsible_party.as_deref(),
            reading.supplier.as_deref(),
        );
        let bucket = buckets.entry((key, window)).or_default();
        bucket.add(reading.quantity, reading.quality, || {
            format!(
                "summing {} readings of {} in {window}",
                spec.point_type, reading.grid_area
            )
        })?;
    }
    Ok(into_rows(buckets))
}

/// Re-aggregate rows to a coarser grouping, e.g. per (grid area, supplier).
///
/// Windows are kept as they are; rows sharing the coarser key and window are
/// summed and their qualities reconciled.
pub fn regroup(rows: &[AggregateRow], grouping: Grouping) -> SettleResult<Vec<AggregateRow>> {
    let mut buckets: BTreeMap<(GroupKey, TimeWindow), Bucket> = BTreeMap::new();
    for row in rows {
        let key = grouping.key(
            &row.grid_area,
            row.responsible_party.as_deref(),
            row.supplier.as_deref(),
        );
        let context_key = key.to_string();
        let bucket = buckets.entry((key, row.time_window)).or_default();
        bucket.add(row.sum_quantity, row.quality, || {
            format!("regrouping {context_key} in {}", row.time_window)
        })?;
    }
    Ok(into_rows(buckets))
}

fn into_rows(buckets: BTreeMap<(GroupKey, TimeWindow), Bucket>) -> Vec<AggregateRow> {
    buckets
        .into_iter()
        .map(|((key, window), bucket)| AggregateRow::new(key, window, bucket.sum, bucket.quality()))
        .collect()
}

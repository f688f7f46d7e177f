//! Net exchange between grid areas.
//!
//! An exchange reading measures flow *into* `in_grid_area` *out of*
//! `out_grid_area`. The same reading therefore counts as inflow on one side
//! and outflow on the other, which is why these aggregations key on the
//! exchange columns instead of the reading's own grid area.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use settle_core::{
    checked_add, checked_sub, ConnectionState, ExchangeRow, PointType, Quality, QualityFold,
    Reading, SettleResult, TimeWindow, WindowWidth,
};
use tracing::debug;

/// Which exchange readings count and how wide the windows are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub connection_states: BTreeSet<ConnectionState>,
    pub width: WindowWidth,
}

impl Default for ExchangeSpec {
    fn default() -> Self {
        Self {
            connection_states: [ConnectionState::Connected].into_iter().collect(),
            width: WindowWidth::hourly(),
        }
    }
}

impl ExchangeSpec {
    pub fn with_width(mut self, width: WindowWidth) -> Self {
        self.width = width;
        self
    }

    fn admitted<'a>(&'a self, readings: &'a [Reading]) -> impl Iterator<Item = (&'a Reading, &'a str, &'a str)> + 'a {
        readings.iter().filter_map(move |reading| {
            if reading.point_type != PointType::Exchange
                || !self.connection_states.contains(&reading.connection_state)
            {
                return None;
            }
            match (reading.in_grid_area.as_deref(), reading.out_grid_area.as_deref()) {
                (Some(into), Some(out_of)) => Some((reading, into, out_of)),
                _ => None,
            }
        })
    }
}

#[derive(Debug, Default)]
struct Flow {
    in_sum: Decimal,
    out_sum: Decimal,
    quality: QualityFold,
}

impl Flow {
    fn into_row(self, grid_area: String, neighbour: Option<String>, window: TimeWindow) -> SettleResult<ExchangeRow> {
        let sum_quantity = checked_sub(self.in_sum, self.out_sum, || {
            format!("netting exchange of {grid_area} in {window}")
        })?;
        Ok(ExchangeRow {
            grid_area,
            neighbour_grid_area: neighbour,
            time_window: window,
            in_sum: self.in_sum,
            out_sum: self.out_sum,
            sum_quantity,
            quality: self.quality.get().unwrap_or(Quality::AsRead),
        })
    }
}

/// Net exchange of every grid area towards each neighbour it trades with.
///
/// For the ordered pair (A, B): `in_sum` is the flow into A out of B,
/// `out_sum` the flow into B out of A, and `sum_quantity = in_sum - out_sum`.
/// Rows are ordered by grid area, neighbour, window.
pub fn net_exchange_per_neighbour(readings: &[Reading], spec: &ExchangeSpec) -> SettleResult<Vec<ExchangeRow>> {
    let mut flows: BTreeMap<(String, String, TimeWindow), Flow> = BTreeMap::new();
    for (reading, into, out_of) in spec.admitted(readings) {
        let window = spec.width.window_for(reading.observed_at)?;
        let context = || format!("summing exchange {out_of} -> {into} in {window}");

        let inbound = flows
            .entry((into.to_string(), out_of.to_string(), window))
            .or_default();
        inbound.in_sum = checked_add(inbound.in_sum, reading.quantity, context)?;
        inbound.quality.push(reading.quality);

        let outbound = flows
            .entry((out_of.to_string(), into.to_string(), window))
            .or_default();
        outbound.out_sum = checked_add(outbound.out_sum, reading.quantity, context)?;
        outbound.quality.push(reading.quality);
    }

    let rows = flows
        .into_iter()
        .map(|((grid_area, neighbour, window), flow)| flow.into_row(grid_area, Some(neighbour), window))
        .collect::<SettleResult<Vec<_>>>()?;
    debug!(rows = rows.len(), "aggregated net exchange per neighbour");
    Ok(rows)
}

/// Net exchange of every grid area across all its borders.
pub fn net_exchange_per_grid_area(readings: &[Reading], spec: &ExchangeSpec) -> SettleResult<Vec<ExchangeRow>> {
    let mut flows: BTreeMap<(String, TimeWindow), Flow> = BTreeMap::new();
    for (reading, into, out_of) in spec.admitted(readings) {
        let window = spec.width.window_for(reading.observed_at)?;
        let context = || format!("summing exchange {out_of} -> {into} in {window}");

        let inbound = flows.entry((into.to_string(), window)).or_default();
        inbound.in_sum = checked_add(inbound.in_sum, reading.quantity, context)?;
        inbound.quality.push(reading.quality);

        let outbound = flows.entry((out_of.to_string(), window)).or_default();
        outbound.out_sum = checked_add(outbound.out_sum, reading.quantity, context)?;
        outbound.quality.push(reading.quality);
    }

    let rows = flows
        .into_iter()
        .map(|((grid_area, window), flow)| flow.into_row(grid_area, None, window))
        .collect::<SettleResult<Vec<_>>>()?;
    debug!(rows = rows.len(), "aggregated net exchange per grid area");
    Ok(rows)
}

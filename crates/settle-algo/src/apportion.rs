//! Temporal apportionment of grid-loss and system-correction quantities.
//!
//! Every aggregate row is looked up against the responsibility interval in
//! force for its grid area and window. When the designated party is the row's
//! supplier, the added quantity for that window is put onto the row. All other
//! rows, and rows whose window has no added quantity or no designated party,
//! pass through unchanged.

use std::collections::HashMap;

use rust_decimal::Decimal;
use settle_core::{
    checked_add, AdjustmentRow, AggregateRow, AttributedAdjustment, ResponsibilityFlag,
    ResponsibilityInterval, SettleResult, TimeWindow,
};
use settle_masterdata::ResponsibilityIndex;
use tracing::{debug, warn};

fn adjustments_by_window<'a>(
    adjustments: &'a [AdjustmentRow],
    flag: ResponsibilityFlag,
) -> SettleResult<HashMap<(&'a str, TimeWindow), Decimal>> {
    let mut by_window: HashMap<(&str, TimeWindow), Decimal> = HashMap::new();
    for adjustment in adjustments.iter().filter(|a| a.flag == flag) {
        let quantity = by_window
            .entry((adjustment.grid_area.as_str(), adjustment.time_window))
            .or_insert(Decimal::ZERO);
        *quantity = checked_add(*quantity, adjustment.quantity, || {
            format!(
                "collecting {flag} of {} in {}",
                adjustment.grid_area, adjustment.time_window
            )
        })?;
    }
    Ok(by_window)
}

/// Add each window's adjustment onto the row of the designated party.
///
/// Only adjustments carrying the index's flag are considered. Row order is
/// preserved.
pub fn apportion(
    rows: &[AggregateRow],
    adjustments: &[AdjustmentRow],
    index: &ResponsibilityIndex,
) -> SettleResult<Vec<AggregateRow>> {
    let flag = index.flag();
    let by_window = adjustments_by_window(adjustments, flag)?;

    let mut adjusted = 0usize;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let mut row = row.clone();
        let added = by_window.get(&(row.grid_area.as_str(), row.time_window));
        let designated = index.party_for(&row.grid_area, &row.time_window);
        if let (Some(added), Some(party)) = (added, designated) {
            if row.supplier.as_deref() == Some(party) {
                row.sum_quantity = checked_add(row.sum_quantity, *added, || {
                    format!(
                        "adding {flag} to {party} in {} {}",
                        row.grid_area, row.time_window
                    )
                })?;
                adjusted += 1;
            }
        }
        out.push(row);
    }

    debug!(%flag, rows = out.len(), adjusted, "apportioned adjustments");
    Ok(out)
}

/// [`apportion`] straight from raw intervals; overlapping designations are an error.
pub fn apportion_with_intervals(
    rows: &[AggregateRow],
    adjustments: &[AdjustmentRow],
    intervals: &[ResponsibilityInterval],
    flag: ResponsibilityFlag,
) -> SettleResult<Vec<AggregateRow>> {
    let index = ResponsibilityIndex::build(intervals, flag)?;
    apportion(rows, adjustments, &index)
}

/// Join each adjustment to its designated party; `party` is `None` when no
/// interval covers the window.
pub fn attribute_adjustments(
    adjustments: &[AdjustmentRow],
    index: &ResponsibilityIndex,
) -> Vec<AttributedAdjustment> {
    let flag = index.flag();
    let attributed: Vec<AttributedAdjustment> = adjustments
        .iter()
        .filter(|adjustment| adjustment.flag == flag)
        .map(|adjustment| AttributedAdjustment {
            grid_area: adjustment.grid_area.clone(),
            time_window: adjustment.time_window,
            flag,
            party: index
                .party_for(&adjustment.grid_area, &adjustment.time_window)
                .map(str::to_string),
            quantity: adjustment.quantity,
        })
        .collect();

    let unassigned = attributed.iter().filter(|a| a.party.is_none()).count();
    if unassigned > 0 {
        warn!(%flag, unassigned, "adjustments without a responsible party");
    }
    attributed
}

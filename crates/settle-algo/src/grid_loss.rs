//! Grid loss: the residual between what enters a grid area and what is consumed.
//!
//! `grid_loss = net_exchange + production - (consumption + flex_consumption)`
//!
//! Each input is first summed per (grid area, window), so party-level rows can
//! be passed straight in. Only keys present in all four inputs produce a row;
//! a window with any input missing is left out rather than assumed zero.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use settle_core::{
    checked_add, checked_sub, AdjustmentRow, AggregateRow, GridLossRow, ResponsibilityFlag,
    SettleResult, TimeWindow,
};
use tracing::debug;

type GridKey = (String, TimeWindow);

fn sum_per_grid_area(rows: &[AggregateRow], input: &str) -> SettleResult<BTreeMap<GridKey, Decimal>> {
    let mut sums: BTreeMap<GridKey, Decimal> = BTreeMap::new();
    for row in rows {
        let sum = sums.entry(row.grid_key()).or_insert(Decimal::ZERO);
        *sum = checked_add(*sum, row.sum_quantity, || {
            format!("summing {input} of {} in {}", row.grid_area, row.time_window)
        })?;
    }
    Ok(sums)
}

pub fn compute_grid_loss(
    net_exchange: &[AggregateRow],
    consumption: &[AggregateRow],
    flex_consumption: &[AggregateRow],
    production: &[AggregateRow],
) -> SettleResult<Vec<GridLossRow>> {
    let exchange = sum_per_grid_area(net_exchange, "net exchange")?;
    let consumption = sum_per_grid_area(consumption, "consumption")?;
    let flex = sum_per_grid_area(flex_consumption, "flex consumption")?;
    let production = sum_per_grid_area(production, "production")?;

    let mut rows = Vec::new();
    for (key, exchange_sum) in &exchange {
        let (Some(consumed), Some(flexed), Some(produced)) =
            (consumption.get(key), flex.get(key), production.get(key))
        else {
            continue;
        };
        let (grid_area, window) = key;
        let context = || format!("computing grid loss of {grid_area} in {window}");
        let supplied = checked_add(*exchange_sum, *produced, context)?;
        let consumed = checked_add(*consumed, *flexed, context)?;
        rows.push(GridLossRow {
            grid_area: grid_area.clone(),
            time_window: *window,
            grid_loss: checked_sub(supplied, consumed, context)?,
        });
    }

    let dropped = exchange.len() - rows.len();
    if dropped > 0 {
        debug!(dropped, "grid-loss windows without all four inputs left out");
    }
    debug!(rows = rows.len(), "computed grid loss");
    Ok(rows)
}

/// `max(0, -grid_loss)` per row, to be covered by the system-correction party.
pub fn added_system_correction(grid_loss: &[GridLossRow]) -> Vec<AdjustmentRow> {
    grid_loss
        .iter()
        .map(|row| AdjustmentRow {
            grid_area: row.grid_area.clone(),
            time_window: row.time_window,
            flag: ResponsibilityFlag::SystemCorrection,
            quantity: row.added_system_correction(),
        })
        .collect()
}

/// `max(0, grid_loss)` per row, to be carried by the grid-loss party.
pub fn added_grid_loss(grid_loss: &[GridLossRow]) -> Vec<AdjustmentRow> {
    grid_loss
        .iter()
        .map(|row| AdjustmentRow {
            grid_area: row.grid_area.clone(),
            time_window: row.time_window,
            flag: ResponsibilityFlag::GridLoss,
            quantity: row.added_grid_loss(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use settle_core::{GroupKey, Grouping, Quality};

    fn window(h: u32) -> TimeWindow {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, h, 0, 0).unwrap();
        TimeWindow::new(start, start + chrono::Duration::hours(1)).unwrap()
    }

    fn row(ga: &str, h: u32, qty: i64) -> AggregateRow {
        let key: GroupKey = Grouping::GridArea.key(ga, None, None);
        AggregateRow::new(key, window(h), Decimal::from(qty), Quality::AsRead)
    }

    #[test]
    fn surplus_becomes_grid_loss() {
        let loss = compute_grid_loss(&[row("G1", 0, 10)], &[row("G1", 0, 3)], &[row("G1", 0, 2)], &[row("G1", 0, 5)]).unwrap();
        assert_eq!(loss.len(), 1);
        assert_eq!(loss[0].grid_loss, Decimal::from(10));
        assert_eq!(added_grid_loss(&loss)[0].quantity, Decimal::from(10));
        assert_eq!(added_system_correction(&loss)[0].quantity, Decimal::ZERO);
    }

    #[test]
    fn deficit_becomes_system_correction() {
        let loss = compute_grid_loss(&[row("G1", 0, 1)], &[row("G1", 0, 2)], &[row("G1", 0, 1)], &[row("G1", 0, 1)]).unwrap();
        assert_eq!(loss[0].grid_loss, Decimal::from(-1));
        assert_eq!(added_system_correction(&loss)[0].quantity, Decimal::ONE);
        assert_eq!(added_grid_loss(&loss)[0].quantity, Decimal::ZERO);
    }

    #[test]
    fn missing_input_excludes_the_window() {
        let loss = compute_grid_loss(
            &[row("G1", 0, 1), row("G1", 1, 1)],
            &[row("G1", 0, 1), row("G1", 1, 1)],
            &[row("G1", 0, 1)],
            &[row("G1", 0, 1), row("G1", 1, 1)],
        )
        .unwrap();
        assert_eq!(loss.len(), 1);
        assert_eq!(loss[0].time_window, window(0));
    }

    #[test]
    fn party_rows_are_summed_per_grid_area() {
        let mut s1 = row("G1", 0, 2);
        s1.supplier = Some("S1".into());
        let mut s2 = row("G1", 0, 3);
        s2.supplier = Some("S2".into());
        let loss = compute_grid_loss(&[row("G1", 0, 10)], &[s1, s2], &[row("G1", 0, 0)], &[row("G1", 0, 0)]).unwrap();
        assert_eq!(loss[0].grid_loss, Decimal::from(5));
    }

    #[test]
    fn adjustments_carry_their_flag() {
        let loss = vec![GridLossRow {
            grid_area: "G1".into(),
            time_window: window(0),
            grid_loss: Decimal::ZERO,
        }];
        assert_eq!(added_grid_loss(&loss)[0].flag, ResponsibilityFlag::GridLoss);
        assert_eq!(added_system_correction(&loss)[0].flag, ResponsibilityFlag::SystemCorrection);
    }
}

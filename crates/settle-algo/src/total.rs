//! Total consumption per grid area: net exchange plus production.

use std::collections::BTreeMap;

use settle_core::{
    checked_add, reconcile, AggregateRow, Grouping, Quality, SettleResult, TimeWindow,
};
use tracing::debug;

use crate::aggregate::Bucket;

fn per_grid_area(rows: &[AggregateRow], input: &str) -> SettleResult<BTreeMap<(String, TimeWindow), Bucket>> {
    let mut groups: BTreeMap<(String, TimeWindow), Bucket> = BTreeMap::new();
    for row in rows {
        groups
            .entry(row.grid_key())
            .or_default()
            .add(row.sum_quantity, row.quality, || {
                format!("summing {input} of {} in {}", row.grid_area, row.time_window)
            })?;
    }
    Ok(groups)
}

/// Sum net exchange and production per (grid area, window).
///
/// Either input may carry several rows per key (quality sub-groups, party
/// rows); they are summed and their qualities reconciled before the two
/// sides are combined. Keys missing from either side produce no row.
pub fn combine(net_exchange: &[AggregateRow], production: &[AggregateRow]) -> SettleResult<Vec<AggregateRow>> {
    let exchange = per_grid_area(net_exchange, "net exchange")?;
    let production = per_grid_area(production, "production")?;

    let mut rows = Vec::new();
    for ((grid_area, window), exchanged) in exchange {
        let Some(produced) = production.get(&(grid_area.clone(), window)) else {
            continue;
        };
        let total = checked_add(exchanged.sum, produced.sum, || {
            format!("computing total consumption of {grid_area} in {window}")
        })?;
        let quality: Quality = reconcile(exchanged.quality(), produced.quality());
        rows.push(AggregateRow::new(
            Grouping::GridArea.key(&grid_area, None, None),
            window,
            total,
            quality,
        ));
    }
    debug!(rows = rows.len(), "combined total consumption");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn window(h: u32) -> TimeWindow {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, h, 0, 0).unwrap();
        TimeWindow::new(start, start + chrono::Duration::hours(1)).unwrap()
    }

    fn row(ga: &str, h: u32, qty: i64, quality: Quality) -> AggregateRow {
        AggregateRow::new(Grouping::GridArea.key(ga, None, None), window(h), Decimal::from(qty), quality)
    }

    #[test]
    fn sums_sub_groups_before_combining() {
        use Quality::*;
        let exchange = [
            row("1", 0, 1, Estimated),
            row("1", 0, 1, Estimated),
            row("1", 0, 1, Estimated),
            row("1", 0, 1, Estimated),
            row("1", 1, 1, QuantityMissing),
            row("2", 0, 1, Estimated),
        ];
        let production = [
            row("1", 0, 1, Estimated),
            row("1", 0, 2, Estimated),
            row("1", 0, 3, Estimated),
            row("1", 0, 4, Estimated),
            row("1", 1, 5, AsRead),
            row("2", 0, 6, Estimated),
        ];
        let total = combine(&exchange, &production).unwrap();
        let sums: Vec<Decimal> = total.iter().map(|r| r.sum_quantity).collect();
        assert_eq!(sums, [Decimal::from(14), Decimal::from(6), Decimal::from(7)]);
        assert_eq!(total[1].quality, Estimated);
    }

    #[test]
    fn quality_matrix() {
        use Quality::*;
        let cases = [
            (Estimated, Estimated, Estimated),
            (Estimated, QuantityMissing, Estimated),
            (Estimated, AsRead, Estimated),
            (QuantityMissing, QuantityMissing, Estimated),
            (QuantityMissing, AsRead, Estimated),
            (AsRead, AsRead, AsRead),
        ];
        for (produced, exchanged, expected) in cases {
            let total = combine(&[row("1", 0, 1, exchanged)], &[row("1", 0, 1, produced)]).unwrap();
            assert_eq!(total[0].quality, expected, "{produced:?} + {exchanged:?}");
        }
    }

    #[test]
    fn output_is_ordered_by_grid_area_then_window() {
        let exchange = [
            row("2", 1, 1, Quality::AsRead),
            row("1", 1, 1, Quality::AsRead),
            row("2", 0, 1, Quality::AsRead),
            row("1", 0, 1, Quality::AsRead),
        ];
        let production = [
            row("1", 0, 1, Quality::AsRead),
            row("2", 0, 1, Quality::AsRead),
            row("1", 1, 1, Quality::AsRead),
            row("2", 1, 1, Quality::AsRead),
        ];
        let total = combine(&exchange, &production).unwrap();
        let keys: Vec<(&str, TimeWindow)> = total
            .iter()
            .map(|r| (r.grid_area.as_str(), r.time_window))
            .collect();
        assert_eq!(
            keys,
            [("1", window(0)), ("1", window(1)), ("2", window(0)), ("2", window(1))]
        );
    }

    #[test]
    fn key_missing_on_one_side_is_dropped() {
        let total = combine(&[row("1", 0, 1, Quality::AsRead)], &[row("2", 0, 1, Quality::AsRead)]).unwrap();
        assert!(total.is_empty());
    }
}

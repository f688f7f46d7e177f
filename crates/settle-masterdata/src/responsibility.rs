//! Interval index over grid-loss / system-correction responsibilities.
//!
//! For a fixed grid area and flag at most one party may be responsible at any
//! instant. [`ResponsibilityIndex::build`] enforces that while sorting each
//! grid area's intervals by start date, so a lookup is a binary search for the
//! last interval starting at or before the window start.
//!
//! Overlapping intervals of the *same* party are coalesced into one; overlapping
//! intervals of different parties are a data-integrity error.

use std::collections::HashMap;

use settle_core::{
    ResponsibilityFlag, ResponsibilityInterval, SettleError, SettleResult, TimeWindow,
};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ResponsibilityIndex {
    flag: ResponsibilityFlag,
    by_grid_area: HashMap<String, Vec<ResponsibilityInterval>>,
}

impl ResponsibilityIndex {
    /// Index the intervals carrying `flag`; all others are ignored.
    pub fn build(intervals: &[ResponsibilityInterval], flag: ResponsibilityFlag) -> SettleResult<Self> {
        let mut by_grid_area: HashMap<String, Vec<ResponsibilityInterval>> = HashMap::new();
        for interval in intervals.iter().filter(|interval| interval.flag == flag) {
            if let Some(to) = interval.to_date {
                if to <= interval.from_date {
                    return Err(SettleError::InvalidInterval {
                        party: interval.party.clone(),
                        grid_area: interval.grid_area.clone(),
                        detail: format!("to_date {to} is not after from_date {}", interval.from_date),
                    });
                }
            }
            by_grid_area
                .entry(interval.grid_area.clone())
                .or_default()
                .push(interval.clone());
        }

        for intervals in by_grid_area.values_mut() {
            intervals.sort_by(|a, b| {
                a.from_date
                    .cmp(&b.from_date)
                    .then_with(|| a.party.cmp(&b.party))
            });
            *intervals = coalesce(std::mem::take(intervals))?;
        }

        debug!(
            %flag,
            grid_areas = by_grid_area.len(),
            "built responsibility index"
        );
        Ok(Self { flag, by_grid_area })
    }

    pub fn flag(&self) -> ResponsibilityFlag {
        self.flag
    }

    pub fn is_empty(&self) -> bool {
        self.by_grid_area.is_empty()
    }

    /// Number of (coalesced) intervals across all grid areas.
    pub fn len(&self) -> usize {
        self.by_grid_area.values().map(Vec::len).sum()
    }

    /// The interval designating the responsible party for the whole window, if any.
    pub fn lookup(&self, grid_area: &str, window: &TimeWindow) -> Option<&ResponsibilityInterval> {
        let intervals = self.by_grid_area.get(grid_area)?;
        let idx = intervals.partition_point(|interval| interval.from_date <= window.start);
        if idx == 0 {
            return None;
        }
        let candidate = &intervals[idx - 1];
        candidate.covers(window).then_some(candidate)
    }

    pub fn party_for(&self, grid_area: &str, window: &TimeWindow) -> Option<&str> {
        self.lookup(grid_area, window)
            .map(|interval| interval.party.as_str())
    }
}

/// Merge same-party overlaps of a start-sorted list; reject cross-party overlaps.
fn coalesce(sorted: Vec<ResponsibilityInterval>) -> SettleResult<Vec<ResponsibilityInterval>> {
    let mut merged: Vec<ResponsibilityInterval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        match merged.last_mut() {
            Some(last) if last.overlaps(&interval) => {
                if last.party != interval.party {
                    return Err(SettleError::ResponsibilityOverlap {
                        grid_area: interval.grid_area.clone(),
                        flag: interval.flag,
                        first_party: last.party.clone(),
                        second_party: interval.party.clone(),
                        at: interval.from_date,
                    });
                }
                last.to_date = match (last.to_date, interval.to_date) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    _ => None,
                };
            }
            _ => merged.push(interval),
        }
    }
    Ok(merged)
}

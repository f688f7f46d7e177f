//! Period mutation: apply an attribute change to one entity's period partition.
//!
//! A partition is a start-sorted, contiguous sequence of [`EntityPeriod`]s. An
//! [`AttributeChangeEvent`] lands in exactly one period (the *target*):
//!
//! - effective date equal to the target's start: the changed attributes are
//!   overwritten in place and the partition keeps its size;
//! - effective date strictly inside the target: the target is cut at the
//!   effective date and a copy carrying the changes is inserted after it,
//!   spanning up to the target's original end.
//!
//! Periods are never merged, and periods of other entities pass through as-is.

use chrono::{DateTime, Utc};
use settle_core::{
    sentinel_end, AttributeChangeEvent, Attributes, EntityPeriod, SettleError, SettleResult,
};
use tracing::debug;

/// What the mutation did to the partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Changes written onto the period starting at the effective date.
    Overwritten,
    /// The period containing the effective date was split in two.
    Split,
}

/// Apply `event` to the periods of `event.entity_id` within `periods`.
///
/// Returns the new partition (sorted by `from_date`) followed by any periods of
/// other entities, unchanged and in their original order.
pub fn apply_change(
    periods: Vec<EntityPeriod>,
    event: &AttributeChangeEvent,
) -> SettleResult<Vec<EntityPeriod>> {
    apply_change_with_kind(periods, event).map(|(periods, _)| periods)
}

/// Like [`apply_change`], also reporting whether the target period was split.
pub fn apply_change_with_kind(
    periods: Vec<EntityPeriod>,
    event: &AttributeChangeEvent,
) -> SettleResult<(Vec<EntityPeriod>, MutationKind)> {
    let (mut own, others): (Vec<_>, Vec<_>) = periods
        .into_iter()
        .partition(|period| period.entity_id == event.entity_id);

    if own.is_empty() {
        return Err(unmatched(event));
    }

    own.sort_by_key(|period| period.from_date);
    check_partition(&own)?;

    let target = own
        .iter()
        .position(|period| period.covers(event.effective_date))
        .ok_or_else(|| unmatched(event))?;

    let kind = if own[target].from_date == event.effective_date {
        overwrite(&mut own[target].attributes, &event.changed_attributes);
        MutationKind::Overwritten
    } else {
        let original_to = own[target].to_date;
        own[target].to_date = event.effective_date;
        let mut attributes = own[target].attributes.clone();
        overwrite(&mut attributes, &event.changed_attributes);
        own.insert(
            target + 1,
            EntityPeriod {
                entity_id: event.entity_id.clone(),
                attributes,
                from_date: event.effective_date,
                to_date: original_to,
            },
        );
        MutationKind::Split
    };

    own.sort_by_key(|period| period.from_date);
    debug!(
        entity = %event.entity_id,
        effective = %event.effective_date,
        ?kind,
        periods = own.len(),
        "applied attribute change"
    );

    own.extend(others);
    Ok((own, kind))
}

/// Verify that a start-sorted partition has no empty periods, gaps or overlaps,
/// and that its last period is open-ended.
pub fn check_partition(periods: &[EntityPeriod]) -> SettleResult<()> {
    for period in periods {
        if period.to_date <= period.from_date {
            return Err(SettleError::BrokenPartition {
                entity_id: period.entity_id.clone(),
                detail: format!(
                    "period starting {} ends at {}",
                    period.from_date, period.to_date
                ),
            });
        }
    }
    for pair in periods.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        if current.entity_id != next.entity_id {
            return Err(SettleError::BrokenPartition {
                entity_id: current.entity_id.clone(),
                detail: format!("partition mixes entity {}", next.entity_id),
            });
        }
        if current.to_date != next.from_date {
            let what = if current.to_date < next.from_date { "gap" } else { "overlap" };
            return Err(SettleError::BrokenPartition {
                entity_id: current.entity_id.clone(),
                detail: format!(
                    "{what} between period ending {} and period starting {}",
                    current.to_date, next.from_date
                ),
            });
        }
    }
    if let Some(last) = periods.last() {
        if last.to_date != sentinel_end() {
            return Err(SettleError::BrokenPartition {
                entity_id: last.entity_id.clone(),
                detail: format!(
                    "last period ends at {} instead of the open-ended {}",
                    last.to_date,
                    sentinel_end()
                ),
            });
        }
    }
    Ok(())
}

/// The period of a partition in force at `instant`.
pub fn period_at(periods: &[EntityPeriod], instant: DateTime<Utc>) -> Option<&EntityPeriod> {
    periods.iter().find(|period| period.covers(instant))
}

fn overwrite(attributes: &mut Attributes, changes: &Attributes) {
    for (key, value) in changes {
        attributes.insert(*key, value.clone());
    }
}

fn unmatched(event: &AttributeChangeEvent) -> SettleError {
    SettleError::UnmatchedEffectiveDate {
        entity_id: event.entity_id.clone(),
        effective_date: event.effective_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use settle_core::{AttributeKey, AttributeValue, SettlementMethod};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, d, 0, 0, 0).unwrap()
    }

    fn period(entity: &str, method: SettlementMethod, from: DateTime<Utc>, to: DateTime<Utc>) -> EntityPeriod {
        let mut attributes = Attributes::new();
        attributes.insert(
            AttributeKey::SettlementMethod,
            AttributeValue::SettlementMethod(method),
        );
        EntityPeriod {
            entity_id: entity.into(),
            attributes,
            from_date: from,
            to_date: to,
        }
    }

    fn change(entity: &str, method: SettlementMethod, effective: DateTime<Utc>) -> AttributeChangeEvent {
        let mut changed_attributes = Attributes::new();
        changed_attributes.insert(
            AttributeKey::SettlementMethod,
            AttributeValue::SettlementMethod(method),
        );
        AttributeChangeEvent {
            entity_id: entity.into(),
            effective_date: effective,
            changed_attributes,
        }
    }

    fn method_of(period: &EntityPeriod) -> SettlementMethod {
        match period.attribute(AttributeKey::SettlementMethod) {
            Some(AttributeValue::SettlementMethod(method)) => *method,
            other => panic!("unexpected attribute {other:?}"),
        }
    }

    #[test]
    fn single_open_period_is_split() {
        let periods = vec![period("1", SettlementMethod::Flex, day(1), sentinel_end())];
        let (result, kind) =
            apply_change_with_kind(periods, &change("1", SettlementMethod::NonProfiled, day(5))).unwrap();
        assert_eq!(kind, MutationKind::Split);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].to_date, day(5));
        assert_eq!(result[1].from_date, day(5));
        assert_eq!(result[1].to_date, sentinel_end());
        assert_eq!(method_of(&result[0]), SettlementMethod::Flex);
        assert_eq!(method_of(&result[1]), SettlementMethod::NonProfiled);
    }

    #[test]
    fn other_entities_pass_through() {
        let periods = vec![
            period("2", SettlementMethod::Profiled, day(1), sentinel_end()),
            period("1", SettlementMethod::Flex, day(1), sentinel_end()),
        ];
        let result = apply_change(periods, &change("1", SettlementMethod::NonProfiled, day(1))).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].entity_id, "1");
        assert_eq!(method_of(&result[0]), SettlementMethod::NonProfiled);
        assert_eq!(result[1].entity_id, "2");
        assert_eq!(method_of(&result[1]), SettlementMethod::Profiled);
    }

    #[test]
    fn unknown_entity_is_unmatched() {
        let periods = vec![period("1", SettlementMethod::Flex, day(1), sentinel_end())];
        let err = apply_change(periods, &change("7", SettlementMethod::Flex, day(3))).unwrap_err();
        assert!(matches!(err, SettleError::UnmatchedEffectiveDate { ref entity_id, .. } if entity_id == "7"));
    }

    #[test]
    fn date_before_partition_is_unmatched() {
        let periods = vec![period("1", SettlementMethod::Flex, day(5), sentinel_end())];
        let err = apply_change(periods, &change("1", SettlementMethod::Flex, day(4))).unwrap_err();
        assert!(matches!(err, SettleError::UnmatchedEffectiveDate { .. }));
    }

    #[test]
    fn date_at_sentinel_is_unmatched() {
        let periods = vec![period("1", SettlementMethod::Flex, day(5), sentinel_end())];
        let err = apply_change(periods, &change("1", SettlementMethod::Flex, sentinel_end())).unwrap_err();
        assert!(matches!(err, SettleError::UnmatchedEffectiveDate { .. }));
    }

    #[test]
    fn gap_in_partition_is_reported() {
        let periods = vec![
            period("1", SettlementMethod::Flex, day(1), day(3)),
            period("1", SettlementMethod::Flex, day(4), sentinel_end()),
        ];
        let err = apply_change(periods, &change("1", SettlementMethod::Flex, day(5))).unwrap_err();
        match err {
            SettleError::BrokenPartition { detail, .. } => assert!(detail.contains("gap")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn closed_last_period_is_reported() {
        let periods = vec![
            period("1", SettlementMethod::Flex, day(1), day(5)),
            period("1", SettlementMethod::Flex, day(5), day(10)),
        ];
        match check_partition(&periods).unwrap_err() {
            SettleError::BrokenPartition { detail, .. } => assert!(detail.contains("open-ended")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn overlap_in_partition_is_reported() {
        let periods = vec![
            period("1", SettlementMethod::Flex, day(1), day(5)),
            period("1", SettlementMethod::Flex, day(4), sentinel_end()),
        ];
        assert!(check_partition(&periods).is_err());
    }

    #[test]
    fn period_at_finds_covering_period() {
        let periods = vec![
            period("1", SettlementMethod::Flex, day(1), day(3)),
            period("1", SettlementMethod::Profiled, day(3), sentinel_end()),
        ];
        assert_eq!(period_at(&periods, day(3)).map(method_of), Some(SettlementMethod::Profiled));
        assert!(period_at(&periods, day(1) - chrono::Duration::seconds(1)).is_none());
    }
}

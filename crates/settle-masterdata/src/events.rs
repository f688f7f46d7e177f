//! Master-data events and the per-entity period store they are applied to.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settle_core::{
    sentinel_end, AttributeChangeEvent, AttributeKey, AttributeValue, Attributes, ConnectionState,
    EntityPeriod, SettleError, SettleResult, SettlementMethod,
};
use tracing::{debug, info, warn};

use crate::period::{apply_change_with_kind, check_partition, MutationKind};
use crate::schema::{AttributeSchema, RawAttributeChange};

/// Upstream metering-point messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MasterDataEvent {
    MeteringPointCreated {
        metering_point_id: String,
        effective_date: DateTime<Utc>,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
    },
    SettlementMethodUpdated {
        metering_point_id: String,
        effective_date: DateTime<Utc>,
        settlement_method: SettlementMethod,
    },
    ConnectionStateUpdated {
        metering_point_id: String,
        effective_date: DateTime<Utc>,
        connection_state: ConnectionState,
    },
    EnergySupplierChanged {
        metering_point_id: String,
        effective_date: DateTime<Utc>,
        energy_supplier: String,
    },
    AttributesChanged(RawAttributeChange),
}

impl MasterDataEvent {
    pub fn entity_id(&self) -> &str {
        match self {
            MasterDataEvent::MeteringPointCreated { metering_point_id, .. }
            | MasterDataEvent::SettlementMethodUpdated { metering_point_id, .. }
            | MasterDataEvent::ConnectionStateUpdated { metering_point_id, .. }
            | MasterDataEvent::EnergySupplierChanged { metering_point_id, .. } => metering_point_id,
            MasterDataEvent::AttributesChanged(raw) => &raw.entity_id,
        }
    }

    pub fn effective_date(&self) -> DateTime<Utc> {
        match self {
            MasterDataEvent::MeteringPointCreated { effective_date, .. }
            | MasterDataEvent::SettlementMethodUpdated { effective_date, .. }
            | MasterDataEvent::ConnectionStateUpdated { effective_date, .. }
            | MasterDataEvent::EnergySupplierChanged { effective_date, .. } => *effective_date,
            MasterDataEvent::AttributesChanged(raw) => raw.effective_date,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MasterDataEvent::MeteringPointCreated { .. } => "metering_point_created",
            MasterDataEvent::SettlementMethodUpdated { .. } => "settlement_method_updated",
            MasterDataEvent::ConnectionStateUpdated { .. } => "connection_state_updated",
            MasterDataEvent::EnergySupplierChanged { .. } => "energy_supplier_changed",
            MasterDataEvent::AttributesChanged(_) => "attributes_changed",
        }
    }

    /// The change to feed the period engine. `None` for creation events.
    pub fn to_change(&self, schema: &AttributeSchema) -> SettleResult<Option<AttributeChangeEvent>> {
        let single = |key: AttributeKey, value: AttributeValue| {
            let mut changed_attributes = Attributes::new();
            changed_attributes.insert(key, value);
            AttributeChangeEvent {
                entity_id: self.entity_id().to_string(),
                effective_date: self.effective_date(),
                changed_attributes,
            }
        };
        let change = match self {
            MasterDataEvent::MeteringPointCreated { .. } => return Ok(None),
            MasterDataEvent::SettlementMethodUpdated { settlement_method, .. } => single(
                AttributeKey::SettlementMethod,
                AttributeValue::SettlementMethod(*settlement_method),
            ),
            MasterDataEvent::ConnectionStateUpdated { connection_state, .. } => single(
                AttributeKey::ConnectionState,
                AttributeValue::ConnectionState(*connection_state),
            ),
            MasterDataEvent::EnergySupplierChanged { energy_supplier, .. } => single(
                AttributeKey::EnergySupplier,
                schema.parse_value(AttributeKey::EnergySupplier, energy_supplier)?,
            ),
            MasterDataEvent::AttributesChanged(raw) => schema.validate(raw)?,
        };
        Ok(Some(change))
    }
}

/// What applying one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Created,
    Mutated(MutationKind),
}

/// Period partitions keyed by entity id.
#[derive(Debug, Clone, Default)]
pub struct PeriodStore {
    schema: AttributeSchema,
    partitions: BTreeMap<String, Vec<EntityPeriod>>,
}

impl PeriodStore {
    pub fn new(schema: AttributeSchema) -> Self {
        Self {
            schema,
            partitions: BTreeMap::new(),
        }
    }

    /// Load existing periods; every entity's partition must be contiguous.
    pub fn from_periods(schema: AttributeSchema, periods: Vec<EntityPeriod>) -> SettleResult<Self> {
        let mut partitions: BTreeMap<String, Vec<EntityPeriod>> = BTreeMap::new();
        for period in periods {
            partitions
                .entry(period.entity_id.clone())
                .or_default()
                .push(period);
        }
        for partition in partitions.values_mut() {
            partition.sort_by_key(|period| period.from_date);
            check_partition(partition)?;
        }
        Ok(Self { schema, partitions })
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    pub fn partition(&self, entity_id: &str) -> Option<&[EntityPeriod]> {
        self.partitions.get(entity_id).map(Vec::as_slice)
    }

    pub fn entity_count(&self) -> usize {
        self.partitions.len()
    }

    /// Apply one event. On error the store is left exactly as it was.
    pub fn apply(&mut self, event: &MasterDataEvent) -> SettleResult<EventOutcome> {
        let entity_id = event.entity_id().to_string();

        if let MasterDataEvent::MeteringPointCreated {
            effective_date,
            attributes,
            ..
        } = event
        {
            if self.partitions.contains_key(&entity_id) {
                return Err(SettleError::Validation(format!(
                    "metering point {entity_id} already exists"
                )));
            }
            let to_date = sentinel_end();
            if *effective_date >= to_date {
                return Err(SettleError::Validation(format!(
                    "metering point {entity_id} created at or after the open-ended sentinel"
                )));
            }
            let period = EntityPeriod {
                entity_id: entity_id.clone(),
                attributes: self.schema.attributes_from_raw(attributes)?,
                from_date: *effective_date,
                to_date,
            };
            self.partitions.insert(entity_id.clone(), vec![period]);
            debug!(entity = %entity_id, "created metering point");
            return Ok(EventOutcome::Created);
        }

        let change = event.to_change(&self.schema)?.ok_or_else(|| {
            SettleError::Other(format!("event {} carries no change", event.name()))
        })?;
        let current = self
            .partitions
            .get(&entity_id)
            .cloned()
            .ok_or_else(|| SettleError::UnmatchedEffectiveDate {
                entity_id: entity_id.clone(),
                effective_date: change.effective_date,
            })?;
        let (updated, kind) = apply_change_with_kind(current, &change)?;
        self.partitions.insert(entity_id, updated);
        Ok(EventOutcome::Mutated(kind))
    }

    pub fn periods(&self) -> impl Iterator<Item = &EntityPeriod> {
        self.partitions.values().flatten()
    }

    pub fn into_periods(self) -> Vec<EntityPeriod> {
        self.partitions.into_values().flatten().collect()
    }
}

/// Result of dispatching a batch of events.
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub created: usize,
    pub overwritten: usize,
    pub split: usize,
    /// Entity id, event name and error message of every failed event.
    pub failures: Vec<(String, String, String)>,
    /// Events not applied because an earlier event for the same entity failed.
    pub skipped: usize,
}

impl DispatchSummary {
    pub fn applied(&self) -> usize {
        self.created + self.overwritten + self.split
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0
    }
}

/// Apply events in order. An entity whose event failed receives no further events.
pub fn dispatch_all(store: &mut PeriodStore, events: &[MasterDataEvent]) -> DispatchSummary {
    let mut summary = DispatchSummary::default();
    let mut poisoned: BTreeSet<String> = BTreeSet::new();

    for event in events {
        let entity_id = event.entity_id();
        if poisoned.contains(entity_id) {
            summary.skipped += 1;
            continue;
        }
        match store.apply(event) {
            Ok(EventOutcome::Created) => summary.created += 1,
            Ok(EventOutcome::Mutated(MutationKind::Overwritten)) => summary.overwritten += 1,
            Ok(EventOutcome::Mutated(MutationKind::Split)) => summary.split += 1,
            Err(err) => {
                warn!(entity = %entity_id, event = event.name(), "master-data event rejected: {err}");
                summary
                    .failures
                    .push((entity_id.to_string(), event.name().to_string(), err.to_string()));
                poisoned.insert(entity_id.to_string());
            }
        }
    }

    info!(
        applied = summary.applied(),
        failed = summary.failures.len(),
        skipped = summary.skipped,
        "dispatched master-data events"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, d, 0, 0, 0).unwrap()
    }

    fn created(id: &str, d: u32) -> MasterDataEvent {
        MasterDataEvent::MeteringPointCreated {
            metering_point_id: id.into(),
            effective_date: day(d),
            attributes: [
                ("settlement_method".to_string(), "E02".to_string()),
                ("grid_area".to_string(), "500".to_string()),
            ]
            .into_iter()
            .collect(),
        }
    }

    fn method(id: &str, d: u32, method: SettlementMethod) -> MasterDataEvent {
        MasterDataEvent::SettlementMethodUpdated {
            metering_point_id: id.into(),
            effective_date: day(d),
            settlement_method: method,
        }
    }

    #[test]
    fn created_point_is_open_ended() {
        let mut store = PeriodStore::default();
        assert_eq!(store.apply(&created("mp1", 1)).unwrap(), EventOutcome::Created);
        let partition = store.partition("mp1").unwrap();
        assert_eq!(partition.len(), 1);
        assert_eq!(partition[0].to_date, sentinel_end());
    }

    #[test]
    fn creating_twice_is_rejected() {
        let mut store = PeriodStore::default();
        store.apply(&created("mp1", 1)).unwrap();
        assert!(store.apply(&created("mp1", 2)).is_err());
    }

    #[test]
    fn failed_event_leaves_partition_untouched() {
        let mut store = PeriodStore::default();
        store.apply(&created("mp1", 5)).unwrap();
        let before = store.partition("mp1").unwrap().to_vec();
        let err = store
            .apply(&method("mp1", 2, SettlementMethod::Flex))
            .unwrap_err();
        assert!(matches!(err, SettleError::UnmatchedEffectiveDate { .. }));
        assert_eq!(store.partition("mp1").unwrap(), before.as_slice());
    }

    #[test]
    fn dispatch_skips_entities_after_a_failure() {
        let mut store = PeriodStore::default();
        let events = vec![
            created("mp1", 5),
            created("mp2", 1),
            method("mp1", 2, SettlementMethod::Flex),
            method("mp1", 9, SettlementMethod::Flex),
            method("mp2", 3, SettlementMethod::Flex),
            method("mp2", 1, SettlementMethod::Profiled),
        ];
        let summary = dispatch_all(&mut store, &events);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.split, 1);
        assert_eq!(summary.overwritten, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(store.partition("mp1").unwrap().len(), 1);
        assert_eq!(store.partition("mp2").unwrap().len(), 2);
    }

    #[test]
    fn events_deserialize_from_tagged_json() {
        let json = r#"{
            "event": "energy_supplier_changed",
            "metering_point_id": "mp1",
            "effective_date": "2021-01-03T00:00:00Z",
            "energy_supplier": "ES9"
        }"#;
        let event: MasterDataEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.entity_id(), "mp1");
        assert_eq!(event.effective_date(), day(3));

        let json = r#"{
            "event": "attributes_changed",
            "entity_id": "mp1",
            "effective_date": "2021-01-03T00:00:00Z",
            "changes": {"unit": "kWh"}
        }"#;
        let event: MasterDataEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.name(), "attributes_changed");
    }

    #[test]
    fn supplier_change_carries_text_attribute() {
        let event = MasterDataEvent::EnergySupplierChanged {
            metering_point_id: "mp1".into(),
            effective_date: day(3),
            energy_supplier: "ES9".into(),
        };
        let change = event
            .to_change(&AttributeSchema::metering_point())
            .unwrap()
            .unwrap();
        assert_eq!(
            change.changed_attributes.get(&AttributeKey::EnergySupplier),
            Some(&AttributeValue::Text("ES9".into()))
        );
    }
}

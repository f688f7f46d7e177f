//! Time-bounded entity attributes (metering-point registrations).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codes::{ConnectionState, PointType, SettlementMethod};

/// Attributes tracked per metering-point period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKey {
    MeteringPointType,
    SettlementMethod,
    GridArea,
    ConnectionState,
    Resolution,
    InGridArea,
    OutGridArea,
    MeteringMethod,
    NetSettlementGroup,
    ParentMeteringPointId,
    Unit,
    Product,
    EnergySupplier,
    BalanceResponsibleParty,
}

impl AttributeKey {
    pub const ALL: &'static [AttributeKey] = &[
        AttributeKey::MeteringPointType,
        AttributeKey::SettlementMethod,
        AttributeKey::GridArea,
        AttributeKey::ConnectionState,
        AttributeKey::Resolution,
        AttributeKey::InGridArea,
        AttributeKey::OutGridArea,
        AttributeKey::MeteringMethod,
        AttributeKey::NetSettlementGroup,
        AttributeKey::ParentMeteringPointId,
        AttributeKey::Unit,
        AttributeKey::Product,
        AttributeKey::EnergySupplier,
        AttributeKey::BalanceResponsibleParty,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AttributeKey::MeteringPointType => "metering_point_type",
            AttributeKey::SettlementMethod => "settlement_method",
            AttributeKey::GridArea => "grid_area",
            AttributeKey::ConnectionState => "connection_state",
            AttributeKey::Resolution => "resolution",
            AttributeKey::InGridArea => "in_grid_area",
            AttributeKey::OutGridArea => "out_grid_area",
            AttributeKey::MeteringMethod => "metering_method",
            AttributeKey::NetSettlementGroup => "net_settlement_group",
            AttributeKey::ParentMeteringPointId => "parent_metering_point_id",
            AttributeKey::Unit => "unit",
            AttributeKey::Product => "product",
            AttributeKey::EnergySupplier => "energy_supplier",
            AttributeKey::BalanceResponsibleParty => "balance_responsible_party",
        }
    }

    pub fn from_name(name: &str) -> Option<AttributeKey> {
        AttributeKey::ALL
            .iter()
            .copied()
            .find(|key| key.name() == name.trim())
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed attribute value. Which variant a key takes is decided by the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    Text(String),
    PointType(PointType),
    SettlementMethod(SettlementMethod),
    ConnectionState(ConnectionState),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(text) => f.write_str(text),
            AttributeValue::PointType(value) => value.fmt(f),
            AttributeValue::SettlementMethod(value) => value.fmt(f),
            AttributeValue::ConnectionState(value) => value.fmt(f),
        }
    }
}

pub type Attributes = BTreeMap<AttributeKey, AttributeValue>;

/// One version of an entity's attributes, valid in `[from_date, to_date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPeriod {
    pub entity_id: String,
    pub attributes: Attributes,
    pub from_date: DateTime<Utc>,
    pub to_date: DateTime<Utc>,
}

impl EntityPeriod {
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.from_date <= instant && instant < self.to_date
    }

    pub fn attribute(&self, key: AttributeKey) -> Option<&AttributeValue> {
        self.attributes.get(&key)
    }
}

/// A validated change to apply from `effective_date` onwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChangeEvent {
    pub entity_id: String,
    pub effective_date: DateTime<Utc>,
    pub changed_attributes: Attributes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_are_unique_and_resolvable() {
        for key in AttributeKey::ALL {
            assert_eq!(AttributeKey::from_name(key.name()), Some(*key));
        }
        assert_eq!(AttributeKey::from_name("colour"), None);
    }

    #[test]
    fn key_serde_matches_name() {
        let json = serde_json::to_string(&AttributeKey::SettlementMethod).unwrap();
        assert_eq!(json, "\"settlement_method\"");
    }

    #[test]
    fn attributes_serialize_as_a_map() {
        let mut attributes = Attributes::new();
        attributes.insert(
            AttributeKey::SettlementMethod,
            AttributeValue::SettlementMethod(SettlementMethod::Flex),
        );
        let json = serde_json::to_string(&attributes).unwrap();
        assert_eq!(json, r#"{"settlement_method":{"settlement_method":"D01"}}"#);
        let back: Attributes = serde_json::from_str(&json).unwrap();
        assert_eq!(back, attributes);
    }
}

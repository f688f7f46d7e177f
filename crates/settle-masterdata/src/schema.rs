//! Attribute schema: which keys an entity carries and how their raw values parse.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settle_core::{
    AttributeChangeEvent, AttributeKey, AttributeValue, Attributes, ConnectionState, PointType,
    SettleError, SettleResult, SettlementMethod,
};

/// How the raw string of an attribute is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    PointType,
    SettlementMethod,
    ConnectionState,
}

/// A change as it arrives from an upstream message: attribute names and raw codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttributeChange {
    pub entity_id: String,
    pub effective_date: DateTime<Utc>,
    #[serde(default)]
    pub changes: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct AttributeSchema {
    kinds: BTreeMap<AttributeKey, ValueKind>,
}

impl AttributeSchema {
    /// Schema with no keys.
    pub fn empty() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// The metering-point schema: codelist-valued keys are typed, the rest are text.
    pub fn metering_point() -> Self {
        let mut schema = Self::empty();
        for key in AttributeKey::ALL {
            let kind = match key {
                AttributeKey::MeteringPointType => ValueKind::PointType,
                AttributeKey::SettlementMethod => ValueKind::SettlementMethod,
                AttributeKey::ConnectionState => ValueKind::ConnectionState,
                _ => ValueKind::Text,
            };
            schema.kinds.insert(*key, kind);
        }
        schema
    }

    pub fn with(mut self, key: AttributeKey, kind: ValueKind) -> Self {
        self.kinds.insert(key, kind);
        self
    }

    pub fn kind_of(&self, key: AttributeKey) -> Option<ValueKind> {
        self.kinds.get(&key).copied()
    }

    pub fn parse_value(&self, key: AttributeKey, raw: &str) -> SettleResult<AttributeValue> {
        let kind = self.kind_of(key).ok_or_else(|| invalid(key.name(), raw))?;
        let value = match kind {
            ValueKind::Text => {
                let text = raw.trim();
                if text.is_empty() {
                    return Err(invalid(key.name(), raw));
                }
                AttributeValue::Text(text.to_string())
            }
            ValueKind::PointType => AttributeValue::PointType(
                raw.parse::<PointType>().map_err(|_| invalid(key.name(), raw))?,
            ),
            ValueKind::SettlementMethod => AttributeValue::SettlementMethod(
                raw.parse::<SettlementMethod>()
                    .map_err(|_| invalid(key.name(), raw))?,
            ),
            ValueKind::ConnectionState => AttributeValue::ConnectionState(
                raw.parse::<ConnectionState>()
                    .map_err(|_| invalid(key.name(), raw))?,
            ),
        };
        Ok(value)
    }

    /// Parse a name → raw-code map into typed attributes.
    pub fn attributes_from_raw(&self, raw: &BTreeMap<String, String>) -> SettleResult<Attributes> {
        let mut attributes = Attributes::new();
        for (name, value) in raw {
            let key = AttributeKey::from_name(name).ok_or_else(|| invalid(name, value))?;
            attributes.insert(key, self.parse_value(key, value)?);
        }
        Ok(attributes)
    }

    /// Validate a raw change into an event the period engine accepts.
    pub fn validate(&self, raw: &RawAttributeChange) -> SettleResult<AttributeChangeEvent> {
        if raw.entity_id.trim().is_empty() {
            return Err(SettleError::Validation(
                "attribute change without entity id".into(),
            ));
        }
        Ok(AttributeChangeEvent {
            entity_id: raw.entity_id.clone(),
            effective_date: raw.effective_date,
            changed_attributes: self.attributes_from_raw(&raw.changes)?,
        })
    }
}

impl Default for AttributeSchema {
    fn default() -> Self {
        Self::metering_point()
    }
}

fn invalid(key: &str, value: &str) -> SettleError {
    SettleError::InvalidAttribute {
        key: key.to_string(),
        value: value.to_string(),
    }
}

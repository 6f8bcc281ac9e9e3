use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Day precision in the Wikibase time model.
pub const PRECISION_DAY: u8 = 11;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Item(String),
    ExternalId(String),
    String(String),
    Url(String),
    Time { time: String, precision: u8 },
}

impl Value {
    pub fn item(id: impl Into<String>) -> Self {
        Value::Item(id.into())
    }

    pub fn external_id(id: impl Into<String>) -> Self {
        Value::ExternalId(id.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn url(value: impl Into<String>) -> Self {
        Value::Url(value.into())
    }

    /// A calendar day rendered as `+YYYY-MM-DDT00:00:00Z`.
    pub fn day(date: NaiveDate) -> Self {
        Value::Time {
            time: date.format("+%Y-%m-%dT00:00:00Z").to_string(),
            precision: PRECISION_DAY,
        }
    }

    /// Textual content used to compare against values read back from the
    /// knowledge base, where the datatype tag is not always recoverable.
    pub fn text(&self) -> &str {
        match self {
            Value::Item(v) | Value::ExternalId(v) | Value::String(v) | Value::Url(v) => v,
            Value::Time { time, .. } => time,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snak {
    pub property: String,
    pub value: Value,
}

impl Snak {
    pub fn new(property: impl Into<String>, value: Value) -> Self {
        Self {
            property: property.into(),
            value,
        }
    }
}

/// One citation attached to a statement: an ordered group of snaks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reference {
    pub snaks: Vec<Snak>,
}

impl Reference {
    pub fn new(snaks: Vec<Snak>) -> Self {
        Self { snaks }
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.snaks
            .iter()
            .find(|snak| snak.property == property)
            .map(|snak| &snak.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub property: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
}

impl Statement {
    pub fn new(property: impl Into<String>, value: Value) -> Self {
        Self {
            property: property.into(),
            value,
            references: Vec::new(),
        }
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    pub fn same_claim(&self, property: &str, value: &str) -> bool {
        self.property == property && self.value.text() == value
    }
}

/// The external-ID claim a record is looked up by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalKey {
    pub property: String,
    pub value: String,
}

impl ExternalKey {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ExternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.property, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_values_are_midnight_with_day_precision() {
        let date = NaiveDate::from_ymd_opt(2017, 1, 27).unwrap();
        assert_eq!(
            Value::day(date),
            Value::Time {
                time: "+2017-01-27T00:00:00Z".to_string(),
                precision: PRECISION_DAY,
            }
        );
    }

    #[test]
    fn reference_lookup_by_property() {
        let reference = Reference::new(vec![
            Snak::new("P248", Value::item("Q1")),
            Snak::new("P699", Value::external_id("DOID:4")),
        ]);
        assert_eq!(reference.get("P699"), Some(&Value::external_id("DOID:4")));
        assert!(reference.get("P813").is_none());
    }
}

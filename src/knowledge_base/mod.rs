//! The knowledge-base collaborator: resolve records by external identifier,
//! create or update them, and get-or-create the shared release record.

mod memory;
pub mod merge;
mod wikibase;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::vocabulary::props;
use crate::domain::{ExternalKey, Release, Statement};

pub use memory::InMemoryKnowledgeBase;
pub use wikibase::{WikibaseClient, WikibaseConfig};

pub const LANGUAGE: &str = "en";

/// A claim as currently stored on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingClaim {
    pub id: String,
    pub property: String,
    pub value: String,
    /// Items its references are stated in.
    #[serde(default)]
    pub stated_in: Vec<String>,
}

impl ExistingClaim {
    pub fn new(id: impl Into<String>, property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            property: property.into(),
            value: value.into(),
            stated_in: Vec::new(),
        }
    }

    /// The claim `statement` becomes once stored under `id`.
    pub fn from_statement(id: impl Into<String>, statement: &Statement) -> Self {
        Self {
            stated_in: stated_in(statement),
            ..Self::new(id, statement.property.clone(), statement.value.text())
        }
    }

    /// True when every source `statement` cites is already cited here.
    pub fn cites_all(&self, statement: &Statement) -> bool {
        stated_in(statement)
            .iter()
            .all(|item| self.stated_in.contains(item))
    }
}

pub(crate) fn stated_in(statement: &Statement) -> Vec<String> {
    statement
        .references
        .iter()
        .filter_map(|reference| reference.get(props::STATED_IN))
        .map(|value| value.text().to_string())
        .collect()
}

/// English-language view of an existing record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub id: String,
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    #[serde(default)]
    pub sitelinks: BTreeMap<String, String>,
    #[serde(default)]
    pub claims: Vec<ExistingClaim>,
}

impl RecordSnapshot {
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn has_claim(&self, property: &str, value: &str) -> bool {
        self.claims
            .iter()
            .any(|claim| claim.property == property && claim.value == value)
    }

    pub fn claims_for<'a>(&'a self, property: &'a str) -> impl Iterator<Item = &'a ExistingClaim> {
        self.claims
            .iter()
            .filter(move |claim| claim.property == property)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sitelink {
    pub site: String,
    pub title: String,
}

/// Everything one node wants written to its record.
///
/// `label` and `description` are only set when they should replace the
/// current value; `aliases` are added to the existing ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub key: ExternalKey,
    pub statements: Vec<Statement>,
    pub append_properties: Vec<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub aliases: BTreeSet<String>,
    pub sitelink: Option<Sitelink>,
}

pub trait KnowledgeBase: Send + Sync {
    /// Every value of `property` mapped to the record carrying it.
    fn id_mapping(&self, property: &str) -> Result<HashMap<String, String>>;

    fn find_record(&self, key: &ExternalKey) -> Result<Option<RecordSnapshot>>;

    /// Applies `update` and returns the record id.
    fn write_record(&self, update: &RecordUpdate, existing: Option<&RecordSnapshot>)
        -> Result<String>;

    /// Record id of an existing release, without creating one.
    fn find_release(&self, release: &Release) -> Result<Option<String>>;

    fn get_or_create_release(&self, release: &Release) -> Result<String>;
}

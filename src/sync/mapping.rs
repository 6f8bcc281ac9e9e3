use anyhow::{Context, Result};
use std::collections::HashMap;

use crate::domain::vocabulary::props;
use crate::knowledge_base::KnowledgeBase;
use crate::utils::iri_from_short_id;

/// Ontology IRI -> knowledge-base record id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    records: HashMap<String, String>,
}

impl IdMapping {
    /// Builds the mapping from `DOID:n` keyed external ids.
    pub fn from_external_ids(ids: HashMap<String, String>) -> Self {
        let records = ids
            .into_iter()
            .map(|(doid, record)| (iri_from_short_id(&doid), record))
            .collect();
        Self { records }
    }

    /// Every record the knowledge base already holds for a Disease Ontology id.
    pub fn load(kb: &dyn KnowledgeBase) -> Result<Self> {
        let ids = kb
            .id_mapping(props::DISEASE_ONTOLOGY_ID)
            .context("cannot load Disease Ontology id mapping")?;
        Ok(Self::from_external_ids(ids))
    }

    pub fn insert(&mut self, iri: impl Into<String>, record: impl Into<String>) {
        self.records.insert(iri.into(), record.into());
    }

    pub fn get(&self, iri: &str) -> Option<&str> {
        self.records.get(iri).map(String::as_str)
    }

    pub fn contains(&self, iri: &str) -> bool {
        self.records.contains_key(iri)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_base::InMemoryKnowledgeBase;

    #[test]
    fn keys_are_converted_to_iris() {
        let kb = InMemoryKnowledgeBase::new();
        let id = kb.insert_record("asthma", &[("P699", "DOID:2841"), ("P494", "J45")]);

        let mapping = IdMapping::load(&kb).unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(
            mapping.get("http://purl.obolibrary.org/obo/DOID_2841"),
            Some(id.as_str())
        );
        assert!(!mapping.contains("DOID:2841"));
    }
}

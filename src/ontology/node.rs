use once_cell::unsync::OnceCell;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use super::document::{RawNode, RawNodeMeta};
use super::graph::OntologyGraph;
use crate::domain::vocabulary::{obo_in_owl, CLASS_TYPE, WIKIPEDIA_XREF_PREFIX};
use crate::domain::Reference;
use crate::error::{OntologyError, Result};
use crate::knowledge_base::KnowledgeBase;
use crate::sync::IdMapping;
use crate::utils::{decode_wiki_title, short_id_from_iri};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub predicate: String,
    pub object: String,
}

/// One ontology class with its parsed metadata and outbound relationships.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    pub doid: String,
    pub label: Option<String>,
    pub node_type: Option<String>,
    pub namespace: Option<String>,
    pub definition: Option<String>,
    pub definition_xrefs: Option<Vec<String>>,
    pub deprecated: bool,
    pub alt_ids: Option<BTreeSet<String>>,
    pub xrefs: Vec<String>,
    pub synonyms: Option<BTreeSet<String>>,
    pub synonym_xrefs: Option<BTreeMap<String, BTreeSet<String>>>,
    pub synonym_values: Option<BTreeMap<String, BTreeSet<String>>>,
    pub wiki_link: Option<String>,
    relationships: Vec<Relationship>,
    reference: OnceCell<Reference>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            doid: short_id_from_iri(&id),
            id,
            label: None,
            node_type: None,
            namespace: None,
            definition: None,
            definition_xrefs: None,
            deprecated: false,
            alt_ids: None,
            xrefs: Vec::new(),
            synonyms: None,
            synonym_xrefs: None,
            synonym_values: None,
            wiki_link: None,
            relationships: Vec::new(),
            reference: OnceCell::new(),
        }
    }

    pub fn from_raw(raw: &RawNode) -> Result<Self> {
        let mut node = Self::new(raw.id.clone());
        node.label = raw.lbl.clone();
        node.node_type = raw.node_type.clone();
        if let Some(meta) = &raw.meta {
            node.parse_metadata(meta)?;
        }
        Ok(node)
    }

    /// Populates definition, deprecation, xrefs, wiki link, namespace,
    /// alternate ids and synonyms from a node metadata block.
    pub fn parse_metadata(&mut self, meta: &RawNodeMeta) -> Result<()> {
        if let Some(definition) = &meta.definition {
            self.definition = definition.val.clone();
            self.definition_xrefs = definition.xrefs.clone();
        }
        self.deprecated = meta.deprecated;

        if let Some(xrefs) = &meta.xrefs {
            self.xrefs = xrefs.iter().map(|xref| xref.val.clone()).collect();
        }

        if let Some(xrefs) = &self.definition_xrefs {
            self.wiki_link = extract_wiki_link(&self.doid, xrefs);
        }

        if let Some(values) = &meta.basic_property_values {
            let mut by_predicate: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
            for value in values {
                by_predicate
                    .entry(value.pred.as_str())
                    .or_default()
                    .insert(value.val.as_str());
            }

            let namespaces = by_predicate
                .get(obo_in_owl::HAS_OBO_NAMESPACE)
                .map(|set| set.iter().copied().collect::<Vec<_>>())
                .unwrap_or_default();
            if namespaces.len() != 1 {
                return Err(OntologyError::Namespace {
                    node: self.id.clone(),
                    count: namespaces.len(),
                });
            }
            self.namespace = Some(namespaces[0].to_string());

            if let Some(alt_ids) = by_predicate.get(obo_in_owl::HAS_ALTERNATIVE_ID) {
                self.alt_ids = Some(alt_ids.iter().map(|id| id.to_string()).collect());
            }
        }

        if let Some(synonyms) = &meta.synonyms {
            let mut xrefs: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            let mut values: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            for synonym in synonyms {
                xrefs
                    .entry(synonym.pred.clone())
                    .or_default()
                    .extend(synonym.xrefs.iter().cloned());
                values
                    .entry(synonym.pred.clone())
                    .or_default()
                    .insert(synonym.val.clone());
            }
            let label = self.label.as_deref();
            self.synonyms = Some(
                values
                    .values()
                    .flatten()
                    .filter(|value| Some(value.as_str()) != label)
                    .cloned()
                    .collect(),
            );
            self.synonym_xrefs = Some(xrefs);
            self.synonym_values = Some(values);
        }

        Ok(())
    }

    pub fn is_class(&self) -> bool {
        self.node_type.as_deref() == Some(CLASS_TYPE)
    }

    pub fn add_relationship(&mut self, predicate: impl Into<String>, object: impl Into<String>) {
        self.relationships.push(Relationship {
            predicate: predicate.into(),
            object: object.into(),
        });
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Relationship targets under `predicates` that have no known record yet.
    pub fn missing_dependencies<'a>(
        &'a self,
        predicates: &[&str],
        mapping: &IdMapping,
    ) -> Vec<&'a str> {
        self.relationships
            .iter()
            .filter(|rel| predicates.iter().any(|p| *p == rel.predicate))
            .map(|rel| rel.object.as_str())
            .filter(|object| !mapping.contains(object))
            .collect()
    }

    /// Provenance block shared by this node's statements, built on first use.
    pub fn reference(&self, graph: &OntologyGraph, kb: &dyn KnowledgeBase) -> Result<&Reference> {
        self.reference
            .get_or_try_init(|| graph.reference_block(kb, &self.doid))
    }
}

fn extract_wiki_link(doid: &str, definition_xrefs: &[String]) -> Option<String> {
    let candidates: Vec<&String> = definition_xrefs
        .iter()
        .filter(|xref| xref.contains(WIKIPEDIA_XREF_PREFIX))
        .collect();
    match candidates.as_slice() {
        [] => None,
        [single] => {
            let title = decode_wiki_title(&single.replace(WIKIPEDIA_XREF_PREFIX, ""));
            // section links like `Embryonal_carcinoma#Testicular` are not page links
            if title.contains('#') {
                None
            } else {
                Some(title)
            }
        }
        many => {
            warn!(doid = %doid, candidates = ?many, "multiple wikilinks");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::document::{PropertyValue, RawDefinition, RawSynonym, RawXref};

    fn namespace_value(ns: &str) -> PropertyValue {
        PropertyValue {
            pred: obo_in_owl::HAS_OBO_NAMESPACE.to_string(),
            val: ns.to_string(),
        }
    }

    fn meta_with_definition_xrefs(xrefs: &[&str]) -> RawNodeMeta {
        RawNodeMeta {
            definition: Some(RawDefinition {
                val: Some("A disease.".to_string()),
                xrefs: Some(xrefs.iter().map(|x| x.to_string()).collect()),
            }),
            ..RawNodeMeta::default()
        }
    }

    #[test]
    fn derives_short_id_from_iri() {
        let node = GraphNode::new("http://purl.obolibrary.org/obo/DOID_2841");
        assert_eq!(node.doid, "DOID:2841");
    }

    #[test]
    fn single_namespace_value_is_accepted() {
        let mut node = GraphNode::new("http://purl.obolibrary.org/obo/DOID_4");
        let meta = RawNodeMeta {
            basic_property_values: Some(vec![
                namespace_value("disease_ontology"),
                namespace_value("disease_ontology"),
                PropertyValue {
                    pred: obo_in_owl::HAS_ALTERNATIVE_ID.to_string(),
                    val: "DOID:0000".to_string(),
                },
            ]),
            ..RawNodeMeta::default()
        };
        node.parse_metadata(&meta).unwrap();
        assert_eq!(node.namespace.as_deref(), Some("disease_ontology"));
        assert!(node.alt_ids.unwrap().contains("DOID:0000"));
    }

    #[test]
    fn zero_or_many_namespace_values_fail() {
        let mut node = GraphNode::new("http://purl.obolibrary.org/obo/DOID_4");
        let none = RawNodeMeta {
            basic_property_values: Some(Vec::new()),
            ..RawNodeMeta::default()
        };
        assert!(matches!(
            node.parse_metadata(&none),
            Err(OntologyError::Namespace { count: 0, .. })
        ));

        let two = RawNodeMeta {
            basic_property_values: Some(vec![namespace_value("a"), namespace_value("b")]),
            ..RawNodeMeta::default()
        };
        assert!(matches!(
            node.parse_metadata(&two),
            Err(OntologyError::Namespace { count: 2, .. })
        ));
    }

    #[test]
    fn single_wikipedia_xref_becomes_wiki_link() {
        let mut node = GraphNode::new("http://purl.obolibrary.org/obo/DOID_1");
        node.parse_metadata(&meta_with_definition_xrefs(&[
            "url:http://en.wikipedia.org/wiki/Sj%C3%B6gren_syndrome",
            "url:http://www.ncbi.nlm.nih.gov/pubmed/1",
        ]))
        .unwrap();
        assert_eq!(node.wiki_link.as_deref(), Some("Sjögren_syndrome"));
        assert_eq!(node.definition.as_deref(), Some("A disease."));
    }

    #[test]
    fn fragment_or_ambiguous_wiki_links_are_dropped() {
        let mut node = GraphNode::new("http://purl.obolibrary.org/obo/DOID_1");
        node.parse_metadata(&meta_with_definition_xrefs(&[
            "url:http://en.wikipedia.org/wiki/Embryonal_carcinoma#Testicular_embryonal_carcinoma",
        ]))
        .unwrap();
        assert!(node.wiki_link.is_none());

        let mut node = GraphNode::new("http://purl.obolibrary.org/obo/DOID_2");
        node.parse_metadata(&meta_with_definition_xrefs(&[
            "url:http://en.wikipedia.org/wiki/Asthma",
            "url:http://en.wikipedia.org/wiki/Status_asthmaticus",
        ]))
        .unwrap();
        assert!(node.wiki_link.is_none());

        let mut node = GraphNode::new("http://purl.obolibrary.org/obo/DOID_3");
        node.parse_metadata(&meta_with_definition_xrefs(&[])).unwrap();
        assert!(node.wiki_link.is_none());
    }

    #[test]
    fn synonyms_exclude_own_label() {
        let raw = RawNode {
            id: "http://purl.obolibrary.org/obo/DOID_2841".to_string(),
            lbl: Some("asthma".to_string()),
            node_type: Some("CLASS".to_string()),
            meta: Some(RawNodeMeta {
                xrefs: Some(vec![RawXref {
                    val: "ICD10CM:J45".to_string(),
                }]),
                synonyms: Some(vec![
                    RawSynonym {
                        pred: "hasExactSynonym".to_string(),
                        val: "asthma".to_string(),
                        xrefs: Vec::new(),
                    },
                    RawSynonym {
                        pred: "hasExactSynonym".to_string(),
                        val: "hyperreactive airway disease".to_string(),
                        xrefs: vec!["MSH:D001249".to_string()],
                    },
                    RawSynonym {
                        pred: "hasRelatedSynonym".to_string(),
                        val: "bronchial asthma".to_string(),
                        xrefs: Vec::new(),
                    },
                ]),
                ..RawNodeMeta::default()
            }),
        };
        let node = GraphNode::from_raw(&raw).unwrap();
        let synonyms = node.synonyms.as_ref().unwrap();
        assert_eq!(synonyms.len(), 2);
        assert!(!synonyms.contains("asthma"));
        assert_eq!(
            node.synonym_xrefs.as_ref().unwrap()["hasExactSynonym"].len(),
            1
        );
        assert_eq!(node.synonym_values.as_ref().unwrap().len(), 2);
        assert_eq!(node.xrefs, vec!["ICD10CM:J45".to_string()]);
        assert!(node.is_class());
        assert!(node.namespace.is_none());
    }

    #[test]
    fn missing_dependencies_ignore_mapped_and_non_structural_targets() {
        let mut node = GraphNode::new("http://purl.obolibrary.org/obo/DOID_2");
        node.add_relationship("is_a", "http://purl.obolibrary.org/obo/DOID_1");
        node.add_relationship("is_a", "http://purl.obolibrary.org/obo/DOID_4");
        node.add_relationship(
            "http://purl.obolibrary.org/obo/RO_0002451",
            "http://purl.obolibrary.org/obo/NCBITaxon_1",
        );
        let mut mapping = IdMapping::default();
        mapping.insert("http://purl.obolibrary.org/obo/DOID_4", "Q12136");

        let missing = node.missing_dependencies(&["is_a"], &mapping);
        assert_eq!(missing, vec!["http://purl.obolibrary.org/obo/DOID_1"]);
    }
}

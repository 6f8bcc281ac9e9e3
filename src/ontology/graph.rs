use chrono::{NaiveDate, NaiveDateTime, Utc};
use once_cell::unsync::OnceCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use super::document::{RawEdge, RawGraph, RawGraphMeta, RawNode};
use super::node::GraphNode;
use crate::domain::vocabulary::{obo_in_owl, props, structural_predicates, RELEASE_DATE_FORMAT};
use crate::domain::{Reference, Release, Snak, Value};
use crate::error::{OntologyError, Result};
use crate::knowledge_base::KnowledgeBase;

/// Release id used by read-only runs when the release record does not exist.
pub const PENDING_RELEASE: &str = "pending";

/// A snapshot of the ontology restricted to the live classes of its
/// default namespace.
#[derive(Debug)]
pub struct OntologyGraph {
    version: String,
    date: NaiveDateTime,
    default_namespace: String,
    nodes: BTreeMap<String, GraphNode>,
    release: OnceCell<String>,
}

impl OntologyGraph {
    pub fn from_raw(raw: &RawGraph) -> Result<Self> {
        let meta = raw
            .meta
            .as_ref()
            .ok_or_else(|| OntologyError::MissingField("meta".to_string()))?;
        let (version, date, default_namespace) = parse_meta(meta)?;

        let mut graph = Self {
            version,
            date,
            default_namespace,
            nodes: BTreeMap::new(),
            release: OnceCell::new(),
        };
        graph.parse_nodes(&raw.nodes)?;
        graph.parse_edges(&raw.edges);
        graph.dedupe_wiki_links();

        info!(
            version = %graph.version,
            date = %graph.date,
            nodes = graph.nodes.len(),
            "ontology snapshot loaded"
        );
        Ok(graph)
    }

    fn parse_nodes(&mut self, nodes: &[RawNode]) -> Result<()> {
        for raw in nodes {
            let node = GraphNode::from_raw(raw)?;
            if self.retains(&node) {
                self.nodes.insert(node.id.clone(), node);
            }
        }
        Ok(())
    }

    fn retains(&self, node: &GraphNode) -> bool {
        node.namespace.as_deref() == Some(self.default_namespace.as_str())
            && !node.deprecated
            && node.is_class()
    }

    fn parse_edges(&mut self, edges: &[RawEdge]) {
        for edge in edges {
            // only classes of this ontology carry structure
            if let Some(node) = self.nodes.get_mut(&edge.sub) {
                node.add_relationship(edge.pred.clone(), edge.obj.clone());
            }
        }
    }

    /// Clears wiki links claimed by more than one node.
    fn dedupe_wiki_links(&mut self) {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for link in self.nodes.values().filter_map(|node| node.wiki_link.clone()) {
            *counts.entry(link).or_default() += 1;
        }
        for node in self.nodes.values_mut() {
            let shared = node
                .wiki_link
                .as_ref()
                .and_then(|link| counts.get(link))
                .is_some_and(|count| *count > 1);
            if shared {
                debug!(doid = %node.doid, link = ?node.wiki_link, "dropping shared wikilink");
                node.wiki_link = None;
            }
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn date(&self) -> NaiveDateTime {
        self.date
    }

    pub fn release_date(&self) -> NaiveDate {
        self.date.date()
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn release_descriptor(&self) -> Release {
        Release::for_snapshot(self.release_date(), self.version.clone())
    }

    /// Record id of this snapshot's release, created on first request.
    pub fn release(&self, kb: &dyn KnowledgeBase) -> Result<&str> {
        self.release
            .get_or_try_init(|| {
                let release = self.release_descriptor();
                kb.get_or_create_release(&release)
                    .map_err(|err| OntologyError::Release {
                        title: release.title.clone(),
                        message: format!("{err:#}"),
                    })
            })
            .map(String::as_str)
    }

    /// Record id of this snapshot's release without creating it. A release
    /// the knowledge base does not hold yet is referenced as
    /// [`PENDING_RELEASE`].
    pub fn lookup_release(&self, kb: &dyn KnowledgeBase) -> Result<&str> {
        self.release
            .get_or_try_init(|| {
                let release = self.release_descriptor();
                match kb.find_release(&release) {
                    Ok(Some(id)) => Ok(id),
                    Ok(None) => {
                        info!(
                            release = %release.title,
                            "release not created yet, referencing a placeholder"
                        );
                        Ok(PENDING_RELEASE.to_string())
                    }
                    Err(err) => Err(OntologyError::Release {
                        title: release.title.clone(),
                        message: format!("{err:#}"),
                    }),
                }
            })
            .map(String::as_str)
    }

    /// Stated-in release, retrieval day and the node's own identifier.
    pub fn reference_block(&self, kb: &dyn KnowledgeBase, doid: &str) -> Result<Reference> {
        let release = self.release(kb)?;
        Ok(Reference::new(vec![
            Snak::new(props::STATED_IN, Value::item(release)),
            Snak::new(props::RETRIEVED, Value::day(Utc::now().date_naive())),
            Snak::new(props::DISEASE_ONTOLOGY_ID, Value::external_id(doid)),
        ]))
    }

    /// Nodes ordered so that structural parents inside the snapshot come
    /// before their children. Ties and cycles fall back to IRI order.
    pub fn processing_order(&self) -> Vec<&GraphNode> {
        let structural = structural_predicates();
        let mut pending: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for (id, node) in &self.nodes {
            let parents: BTreeSet<&str> = node
                .relationships()
                .iter()
                .filter(|rel| structural.iter().any(|p| *p == rel.predicate))
                .map(|rel| rel.object.as_str())
                .filter(|object| *object != id.as_str() && self.nodes.contains_key(*object))
                .collect();
            for parent in &parents {
                dependents.entry(*parent).or_default().push(id.as_str());
            }
            pending.insert(id.as_str(), parents);
        }

        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, parents)| parents.is_empty())
            .map(|(id, _)| *id)
            .collect();
        let mut order: Vec<&str> = Vec::with_capacity(self.nodes.len());

        while let Some(id) = ready.pop_first() {
            pending.remove(&id);
            order.push(id);
            for child in dependents.get(&id).into_iter().flatten() {
                if let Some(parents) = pending.get_mut(child) {
                    parents.remove(&id);
                    if parents.is_empty() {
                        ready.insert(*child);
                    }
                }
            }
        }

        if !pending.is_empty() {
            debug!(remaining = pending.len(), "structural cycle in snapshot");
            order.extend(pending.keys().copied());
        }

        order
            .into_iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }
}

fn parse_meta(meta: &RawGraphMeta) -> Result<(String, NaiveDateTime, String)> {
    let version = meta
        .version
        .clone()
        .ok_or_else(|| OntologyError::MissingField("meta.version".to_string()))?;

    let date_value = property_value(meta, obo_in_owl::DATE)?;
    let date = NaiveDateTime::parse_from_str(date_value, RELEASE_DATE_FORMAT).map_err(|source| {
        OntologyError::InvalidDate {
            value: date_value.to_string(),
            source,
        }
    })?;

    let default_namespace = property_value(meta, obo_in_owl::DEFAULT_NAMESPACE)?.to_string();
    Ok((version, date, default_namespace))
}

fn property_value<'a>(meta: &'a RawGraphMeta, predicate: &str) -> Result<&'a str> {
    meta.basic_property_values
        .iter()
        .find(|value| value.pred == predicate)
        .map(|value| value.val.as_str())
        .ok_or_else(|| OntologyError::MissingField(predicate.to_string()))
}

use tracing::{debug, warn};

use super::mapping::IdMapping;
use crate::domain::vocabulary::{
    edge_property, props, xref_property, DISEASE_ITEM, MIRIAM_COLLECTION_URL, MIRIAM_ITEM,
    RESOLVER_URL_BASE, ROOT_DOID,
};
use crate::domain::{Reference, Snak, Statement, Value};
use crate::ontology::GraphNode;

/// Turns one graph node into the statements written to its record.
///
/// Every statement carries the node's reference block, except the resolver
/// URL which cites the identifier registry instead.
pub struct StatementBuilder<'a> {
    node: &'a GraphNode,
    mapping: &'a IdMapping,
    reference: &'a Reference,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(node: &'a GraphNode, mapping: &'a IdMapping, reference: &'a Reference) -> Self {
        Self {
            node,
            mapping,
            reference,
        }
    }

    pub fn build(&self) -> Vec<Statement> {
        let mut statements = self.xref_statements();
        statements.extend(self.main_statements());
        statements
    }

    /// The node's own identifier plus one external id per recognised xref.
    pub fn xref_statements(&self) -> Vec<Statement> {
        let mut statements = vec![self.referenced(
            props::DISEASE_ONTOLOGY_ID,
            Value::external_id(self.node.doid.clone()),
        )];

        for xref in &self.node.xrefs {
            let Some((prefix, code)) = xref.split_once(':') else {
                debug!(doid = %self.node.doid, xref = %xref, "xref without prefix");
                continue;
            };
            match xref_property(prefix) {
                Some(property) => {
                    statements.push(self.referenced(property, Value::external_id(code)));
                }
                None => {
                    debug!(doid = %self.node.doid, prefix = %prefix, "unmapped xref prefix");
                }
            }
        }
        statements
    }

    pub fn main_statements(&self) -> Vec<Statement> {
        let mut statements = Vec::new();

        for rel in self.node.relationships() {
            let Some(property) = edge_property(&rel.predicate) else {
                warn!(doid = %self.node.doid, predicate = %rel.predicate, "unknown relationship predicate");
                continue;
            };
            let Some(target) = self.mapping.get(&rel.object) else {
                warn!(doid = %self.node.doid, object = %rel.object, "relationship target has no record");
                continue;
            };
            statements.push(self.referenced(property, Value::item(target)));
        }

        statements.push(self.referenced(props::EXACT_MATCH, Value::url(self.node.id.clone())));

        if self.node.doid != ROOT_DOID {
            statements.push(self.referenced(props::INSTANCE_OF, Value::item(DISEASE_ITEM)));
        }

        statements.push(
            Statement::new(
                props::EXACT_MATCH,
                Value::url(format!("{}{}", RESOLVER_URL_BASE, self.node.doid)),
            )
            .with_reference(resolver_reference()),
        );

        statements
    }

    fn referenced(&self, property: &str, value: Value) -> Statement {
        Statement::new(property, value).with_reference(self.reference.clone())
    }
}

/// Citation of the identifier registry that backs the resolver URL.
pub fn resolver_reference() -> Reference {
    Reference::new(vec![
        Snak::new(props::STATED_IN, Value::item(MIRIAM_ITEM)),
        Snak::new(props::REFERENCE_URL, Value::url(MIRIAM_COLLECTION_URL)),
    ])
}

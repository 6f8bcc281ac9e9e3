mod document;
mod graph;
mod node;

pub use document::{
    ObographDocument, ObographLoader, PropertyValue, RawDefinition, RawEdge, RawGraph,
    RawGraphMeta, RawNode, RawNodeMeta, RawSynonym, RawXref,
};
pub use graph::{OntologyGraph, PENDING_RELEASE};
pub use node::{GraphNode, Relationship};

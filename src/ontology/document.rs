//! Serde model of an OBO-graph JSON export.
//!
//! Only the fields the bot reads are modelled; everything else in the
//! export is ignored.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{OntologyError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObographDocument {
    #[serde(default)]
    pub graphs: Vec<RawGraph>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGraph {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RawGraphMeta>,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGraphMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, rename = "basicPropertyValues")]
    pub basic_property_values: Vec<PropertyValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub pred: String,
    pub val: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lbl: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RawNodeMeta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNodeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<RawDefinition>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xrefs: Option<Vec<RawXref>>,
    #[serde(
        default,
        rename = "basicPropertyValues",
        skip_serializing_if = "Option::is_none"
    )]
    pub basic_property_values: Option<Vec<PropertyValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synonyms: Option<Vec<RawSynonym>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xrefs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawXref {
    pub val: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSynonym {
    pub pred: String,
    pub val: String,
    #[serde(default)]
    pub xrefs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEdge {
    pub sub: String,
    pub pred: String,
    pub obj: String,
}

pub struct ObographLoader;

impl ObographLoader {
    /// Reads an export and returns its first graph.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawGraph> {
        let data = fs::read_to_string(path.as_ref())?;
        Self::load_from_str(&data)
    }

    pub fn load_from_str(data: &str) -> Result<RawGraph> {
        let document: ObographDocument = serde_json::from_str(data)?;
        Self::first_graph(document)
    }

    pub fn load_from_value(value: serde_json::Value) -> Result<RawGraph> {
        let document: ObographDocument = serde_json::from_value(value)?;
        Self::first_graph(document)
    }

    fn first_graph(document: ObographDocument) -> Result<RawGraph> {
        document
            .graphs
            .into_iter()
            .next()
            .ok_or(OntologyError::MissingGraph)
    }
}

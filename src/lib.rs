pub mod domain;
pub mod download;
pub mod error;
pub mod knowledge_base;
pub mod ontology;
pub mod run_log;
pub mod sync;
pub mod utils;

pub use domain::{ExternalKey, Reference, Release, Snak, Statement, Value};
pub use error::OntologyError;
pub use knowledge_base::{InMemoryKnowledgeBase, KnowledgeBase, WikibaseClient, WikibaseConfig};
pub use ontology::{GraphNode, ObographLoader, OntologyGraph};
pub use run_log::{LogEntry, RunLog, RunMetadata};
pub use sync::{IdMapping, NodeOutcome, RunSummary, StatementBuilder, SyncOptions, Synchronizer};

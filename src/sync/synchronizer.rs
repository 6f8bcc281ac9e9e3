use anyhow::Result;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, info};

use super::mapping::IdMapping;
use super::record::assemble_update;
use super::statements::StatementBuilder;
use crate::domain::vocabulary::props;
use crate::domain::{ExternalKey, Statement};
use crate::knowledge_base::KnowledgeBase;
use crate::ontology::{GraphNode, OntologyGraph};
use crate::run_log::{LogEntry, RunLog};

const PROGRESS_INTERVAL: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Write to the knowledge base; when false records are only resolved.
    pub persist: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { persist: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    pub doid: String,
    pub property: String,
    pub message: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    Written(String),
    /// Not persisted; carries the id of the record that already exists, if any.
    DryRun(Option<String>),
    Skipped,
    Failed(NodeFailure),
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub written: usize,
    pub dry_run: usize,
    pub skipped: usize,
    pub failures: Vec<NodeFailure>,
    pub elapsed: Duration,
}

impl RunSummary {
    fn count(&mut self, outcome: NodeOutcome) {
        match outcome {
            NodeOutcome::Written(_) => self.written += 1,
            NodeOutcome::DryRun(_) => self.dry_run += 1,
            NodeOutcome::Skipped => self.skipped += 1,
            NodeOutcome::Failed(failure) => self.failures.push(failure),
        }
    }

    pub fn processed(&self) -> usize {
        self.written + self.dry_run + self.skipped + self.failures.len()
    }
}

/// Drives one pass over a snapshot, node by node, against a knowledge base.
pub struct Synchronizer<'a> {
    graph: &'a OntologyGraph,
    kb: &'a dyn KnowledgeBase,
    log: &'a RunLog,
    options: SyncOptions,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        graph: &'a OntologyGraph,
        kb: &'a dyn KnowledgeBase,
        log: &'a RunLog,
        options: SyncOptions,
    ) -> Self {
        Self {
            graph,
            kb,
            log,
            options,
        }
    }

    /// Processes every node. Per-node failures are collected in the summary;
    /// only loading the id mapping or resolving the release aborts the pass.
    /// A dry run looks the release up but never creates it.
    pub fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let mut mapping = IdMapping::load(self.kb)?;
        let release = if self.options.persist {
            self.graph.release(self.kb)?
        } else {
            self.graph.lookup_release(self.kb)?
        };
        info!(
            release = %release,
            known_records = mapping.len(),
            nodes = self.graph.len(),
            persist = self.options.persist,
            "starting synchronization"
        );

        let order = self.graph.processing_order();
        let total = order.len();
        let mut summary = RunSummary::default();

        for (index, node) in order.into_iter().enumerate() {
            let outcome = self.create(node, &mut mapping)?;
            summary.count(outcome);

            let done = index + 1;
            if done % PROGRESS_INTERVAL == 0 {
                info!(done, total, failures = summary.failures.len(), "progress");
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            written = summary.written,
            dry_run = summary.dry_run,
            skipped = summary.skipped,
            failures = summary.failures.len(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "synchronization finished"
        );
        Ok(summary)
    }

    /// Creates or updates the record of one node.
    ///
    /// Errors returned here are fatal. Anything that goes wrong while
    /// resolving or writing the record becomes [`NodeOutcome::Failed`].
    pub fn create(&self, node: &GraphNode, mapping: &mut IdMapping) -> Result<NodeOutcome> {
        if node.deprecated {
            return Ok(NodeOutcome::Skipped);
        }

        let reference = node.reference(self.graph, self.kb)?;
        let statements = StatementBuilder::new(node, mapping, reference).build();

        let outcome = match self.try_create(node, statements) {
            Ok(outcome) => outcome,
            Err(err) => {
                let failure = NodeFailure {
                    doid: node.doid.clone(),
                    property: props::DISEASE_ONTOLOGY_ID.to_string(),
                    message: format!("{err:#}"),
                    kind: "Error".to_string(),
                };
                error!(doid = %failure.doid, error = %failure.message, "node synchronization failed");
                self.log.record(LogEntry::failure(
                    failure.doid.clone(),
                    failure.property.clone(),
                    failure.message.clone(),
                    failure.kind.clone(),
                ))?;
                return Ok(NodeOutcome::Failed(failure));
            }
        };

        match &outcome {
            NodeOutcome::Written(id) | NodeOutcome::DryRun(Some(id)) => {
                mapping.insert(node.id.clone(), id.clone());
            }
            _ => {}
        }

        let (record_id, message) = match &outcome {
            NodeOutcome::Written(id) => (Some(id.clone()), ""),
            NodeOutcome::DryRun(id) => (id.clone(), "dry run"),
            _ => (None, ""),
        };
        self.log.record(LogEntry::success(
            node.doid.clone(),
            props::DISEASE_ONTOLOGY_ID,
            record_id,
            message,
        ))?;
        Ok(outcome)
    }

    fn try_create(&self, node: &GraphNode, statements: Vec<Statement>) -> Result<NodeOutcome> {
        let key = ExternalKey::new(props::DISEASE_ONTOLOGY_ID, node.doid.clone());
        let existing = self.kb.find_record(&key)?;
        let update = assemble_update(node, statements, existing.as_ref());

        if !self.options.persist {
            return Ok(NodeOutcome::DryRun(existing.map(|record| record.id)));
        }

        let id = self.kb.write_record(&update, existing.as_ref())?;
        Ok(NodeOutcome::Written(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OntologyError;
    use crate::knowledge_base::InMemoryKnowledgeBase;
    use crate::ontology::ObographLoader;
    use crate::run_log::{LogLevel, RunMetadata};
    use serde_json::json;

    fn graph() -> OntologyGraph {
        let ns = json!({"basicPropertyValues": [
            {"pred": "http://www.geneontology.org/formats/oboInOwl#hasOBONamespace", "val": "disease_ontology"}
        ]});
        let doc = json!({"graphs": [{
            "meta": {
                "version": "http://purl.obolibrary.org/obo/doid/releases/2017-01-27/doid.owl",
                "basicPropertyValues": [
                    {"pred": "http://www.geneontology.org/formats/oboInOwl#date", "val": "27:01:2017 11:56"},
                    {"pred": "http://www.geneontology.org/formats/oboInOwl#default-namespace", "val": "disease_ontology"}
                ]
            },
            "nodes": [
                {"id": "http://purl.obolibrary.org/obo/DOID_4", "lbl": "disease", "type": "CLASS", "meta": ns},
                {"id": "http://purl.obolibrary.org/obo/DOID_2841", "lbl": "asthma", "type": "CLASS", "meta": ns}
            ],
            "edges": [
                {"sub": "http://purl.obolibrary.org/obo/DOID_2841", "pred": "is_a", "obj": "http://purl.obolibrary.org/obo/DOID_4"}
            ]
        }]});
        OntologyGraph::from_raw(&ObographLoader::load_from_value(doc).unwrap()).unwrap()
    }

    #[test]
    fn dry_run_writes_nothing() {
        let graph = graph();
        let kb = InMemoryKnowledgeBase::new();
        let log = RunLog::in_memory(RunMetadata::for_bot("test"));
        let summary = Synchronizer::new(&graph, &kb, &log, SyncOptions { persist: false })
            .run()
            .unwrap();

        assert_eq!(summary.dry_run, 2);
        assert_eq!(summary.processed(), 2);
        assert_eq!(kb.writes(), 0);
        assert_eq!(kb.releases_created(), 0);
        assert_eq!(graph.lookup_release(&kb).unwrap(), crate::ontology::PENDING_RELEASE);
        assert!(log.entries().iter().all(|e| e.message == "dry run"));
    }

    #[test]
    fn deprecated_nodes_are_skipped() {
        let graph = graph();
        let kb = InMemoryKnowledgeBase::new();
        let log = RunLog::in_memory(RunMetadata::for_bot("test"));
        let mut node = GraphNode::new("http://purl.obolibrary.org/obo/DOID_1");
        node.deprecated = true;

        let outcome = Synchronizer::new(&graph, &kb, &log, SyncOptions::default())
            .create(&node, &mut IdMapping::default())
            .unwrap();
        assert_eq!(outcome, NodeOutcome::Skipped);
        assert_eq!(kb.releases_created(), 0);
        assert!(log.entries().is_empty());
    }

    #[test]
    fn failures_are_logged_and_the_pass_continues() {
        let graph = graph();
        let kb = InMemoryKnowledgeBase::new();
        kb.reject_writes_for("DOID:4");
        let log = RunLog::in_memory(RunMetadata::for_bot("test"));
        let summary = Synchronizer::new(&graph, &kb, &log, SyncOptions::default())
            .run()
            .unwrap();

        assert_eq!(summary.written, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].doid, "DOID:4");
        let entries = log.entries();
        assert_eq!(entries[0].level, LogLevel::Error);
        assert_eq!(entries[0].external_id_prop, "P699");
    }

    #[test]
    fn release_failure_aborts_the_run() {
        let graph = graph();
        let kb = InMemoryKnowledgeBase::new();
        kb.fail_releases();
        let log = RunLog::in_memory(RunMetadata::for_bot("test"));
        let err = Synchronizer::new(&graph, &kb, &log, SyncOptions::default())
            .run()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OntologyError>(),
            Some(OntologyError::Release { .. })
        ));
        assert_eq!(kb.writes(), 0);
    }
}

use doid_sync::knowledge_base::RecordSnapshot;
use doid_sync::{
    InMemoryKnowledgeBase, KnowledgeBase, ObographLoader, OntologyError, OntologyGraph, RunLog,
    RunMetadata, SyncOptions, Synchronizer, Value,
};
use serde_json::{json, Value as Json};
use std::io::Write;

const NS: &str = "disease_ontology";

fn purl(id: &str) -> String {
    format!("http://purl.obolibrary.org/obo/{id}")
}

fn class(id: &str, label: &str, xrefs: &[&str]) -> Json {
    json!({
        "id": purl(id),
        "lbl": label,
        "type": "CLASS",
        "meta": {
            "definition": {"val": format!("A {label}.")},
            "xrefs": xrefs.iter().map(|x| json!({"val": x})).collect::<Vec<_>>(),
            "basicPropertyValues": [
                {"pred": "http://www.geneontology.org/formats/oboInOwl#hasOBONamespace", "val": NS}
            ]
        }
    })
}

fn three_node_snapshot() -> Json {
    json!({
        "graphs": [{
            "id": "http://purl.obolibrary.org/obo/doid.owl",
            "meta": {
                "version": "http://purl.obolibrary.org/obo/doid/releases/2017-01-27/doid.owl",
                "basicPropertyValues": [
                    {"pred": "http://www.geneontology.org/formats/oboInOwl#date", "val": "27:01:2017 11:56"},
                    {"pred": "http://www.geneontology.org/formats/oboInOwl#default-namespace", "val": NS}
                ]
            },
            "nodes": [
                class("DOID_4", "disease", &[]),
                class("DOID_100", "disease A", &[]),
                class("DOID_200", "disease B", &["ICD10CM:J45", "SNOMEDCT_US_2016_03_01:1"])
            ],
            "edges": [
                {"sub": purl("DOID_200"), "pred": "is_a", "obj": purl("DOID_100")},
                {"sub": purl("DOID_100"), "pred": "is_a", "obj": purl("DOID_4")}
            ]
        }]
    })
}

fn load(snapshot: &Json) -> OntologyGraph {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{snapshot}").unwrap();
    let raw = ObographLoader::load_from_path(file.path()).unwrap();
    OntologyGraph::from_raw(&raw).unwrap()
}

fn record_for(kb: &InMemoryKnowledgeBase, doid: &str) -> RecordSnapshot {
    let id = kb.id_mapping("P699").unwrap()[doid].clone();
    kb.record(&id).unwrap()
}

fn sync(graph: &OntologyGraph, kb: &InMemoryKnowledgeBase) -> doid_sync::RunSummary {
    let log = RunLog::in_memory(RunMetadata::for_bot("test"));
    Synchronizer::new(graph, kb, &log, SyncOptions::default())
        .run()
        .unwrap()
}

#[test]
fn three_node_graph_is_written_with_structure_and_provenance() {
    let graph = load(&three_node_snapshot());
    let kb = InMemoryKnowledgeBase::new();
    let summary = sync(&graph, &kb);
    assert_eq!(summary.written, 3);
    assert!(summary.failures.is_empty());

    let root = record_for(&kb, "DOID:4");
    let a = record_for(&kb, "DOID:100");
    let b = record_for(&kb, "DOID:200");

    assert!(!root.has_claim("P31", "Q12136"));
    assert!(a.has_claim("P31", "Q12136"));
    assert!(b.has_claim("P31", "Q12136"));

    assert!(a.has_claim("P279", &root.id));
    assert!(b.has_claim("P279", &a.id));
    assert_eq!(root.claims_for("P279").count(), 0);

    assert!(b.has_claim("P494", "J45"));
    assert_eq!(b.claims_for("P494").count(), 1);
    assert_eq!(a.claims_for("P494").count(), 0);

    for (record, doid, iri) in [
        (&root, "DOID:4", purl("DOID_4")),
        (&a, "DOID:100", purl("DOID_100")),
        (&b, "DOID:200", purl("DOID_200")),
    ] {
        assert!(record.has_claim("P699", doid));
        assert!(record.has_claim("P2888", &iri));
        assert!(record.has_claim("P2888", &format!("http://identifiers.org/doid/{doid}")));
    }

    assert_eq!(root.label.as_deref(), Some("disease"));
    assert_eq!(b.description.as_deref(), Some("A disease B."));
    assert_eq!(kb.releases_created(), 1);
}

#[test]
fn statements_carry_the_release_reference_except_the_resolver_url() {
    let graph = load(&three_node_snapshot());
    let kb = InMemoryKnowledgeBase::new();
    let release = graph.release(&kb).unwrap().to_string();

    let node = graph.node(&purl("DOID_200")).unwrap();
    let reference = node.reference(&graph, &kb).unwrap().clone();
    let mapping = doid_sync::IdMapping::default();
    let statements = doid_sync::StatementBuilder::new(node, &mapping, &reference).build();

    for statement in &statements {
        let stated_in = statement.references[0].get("P248").unwrap();
        if statement.same_claim("P2888", "http://identifiers.org/doid/DOID:200") {
            assert_eq!(stated_in, &Value::item("Q16335166"));
        } else {
            assert_eq!(stated_in, &Value::item(release.clone()));
            assert_eq!(
                statement.references[0].get("P699"),
                Some(&Value::external_id("DOID:200"))
            );
        }
    }
}

#[test]
fn rerunning_a_snapshot_is_idempotent() {
    let graph = load(&three_node_snapshot());
    let kb = InMemoryKnowledgeBase::new();
    sync(&graph, &kb);
    let writes = kb.writes();
    let before = kb.records();

    let graph = load(&three_node_snapshot());
    let summary = sync(&graph, &kb);
    assert_eq!(summary.written, 3);
    assert_eq!(kb.writes(), writes);
    assert_eq!(kb.records(), before);
    assert_eq!(kb.releases_created(), 1);
    assert_eq!(record_for(&kb, "DOID:4").claims_for("P699").count(), 1);
}

#[test]
fn existing_records_are_updated_in_place() {
    let kb = InMemoryKnowledgeBase::new();
    let existing = kb.insert_record(
        "Disease",
        &[("P699", "DOID:4"), ("P494", "R69"), ("P279", "Q999")],
    );

    let graph = load(&three_node_snapshot());
    sync(&graph, &kb);

    let root = kb.record(&existing).unwrap();
    assert_eq!(root.label.as_deref(), Some("Disease"));
    // properties the update does not mention are left alone
    assert!(root.has_claim("P494", "R69"));
    assert!(root.has_claim("P279", "Q999"));
    assert!(root.has_claim("P2888", &purl("DOID_4")));
    assert_eq!(kb.id_mapping("P699").unwrap().len(), 3);

    // the seeded identifier claim now cites the release
    let release = graph.release(&kb).unwrap();
    let seeded = root.claims_for("P699").collect::<Vec<_>>();
    assert_eq!(seeded.len(), 1);
    assert!(seeded[0].stated_in.iter().any(|item| item == release));
}

#[test]
fn one_failing_node_does_not_stop_the_pass() {
    let graph = load(&three_node_snapshot());
    let kb = InMemoryKnowledgeBase::new();
    kb.reject_writes_for("DOID:100");

    let summary = sync(&graph, &kb);
    assert_eq!(summary.written, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].doid, "DOID:100");
    assert_eq!(summary.failures[0].property, "P699");

    let b = record_for(&kb, "DOID:200");
    assert_eq!(b.claims_for("P279").count(), 0);
}

#[test]
fn release_failure_aborts_before_any_write() {
    let graph = load(&three_node_snapshot());
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
    assert!(kb.records().is_empty());
    assert!(log.entries().is_empty());
}

#[test]
fn run_log_file_records_every_node() {
    let dir = tempfile::tempdir().unwrap();
    let graph = load(&three_node_snapshot());
    let kb = InMemoryKnowledgeBase::new();
    let log = RunLog::create(dir.path(), RunMetadata::for_bot("20170127_11:56")).unwrap();
    Synchronizer::new(&graph, &kb, &log, SyncOptions::default())
        .run()
        .unwrap();

    let content = std::fs::read_to_string(dir.path().join("DOIDBot-20170127_11:56.log")).unwrap();
    assert_eq!(content.lines().count(), 4);
}

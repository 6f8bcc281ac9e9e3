use once_cell::sync::Lazy;
use std::collections::HashMap;

pub mod props {
    pub const SUBCLASS_OF: &str = "P279";
    pub const HAS_CAUSE: &str = "P828";
    pub const LOCATED_IN: &str = "P276";
    pub const INSTANCE_OF: &str = "P31";
    pub const EXACT_MATCH: &str = "P2888";
    pub const ORPHANET_ID: &str = "P1550";
    pub const UMLS_CUI: &str = "P2892";
    pub const DISEASE_ONTOLOGY_ID: &str = "P699";
    pub const ICD_10: &str = "P494";
    pub const ICD_9: &str = "P493";
    pub const MESH_ID: &str = "P486";
    pub const NCI_THESAURUS_ID: &str = "P1748";
    pub const OMIM_ID: &str = "P492";

    pub const STATED_IN: &str = "P248";
    pub const RETRIEVED: &str = "P813";
    pub const REFERENCE_URL: &str = "P854";

    pub const EDITION_OF: &str = "P629";
    pub const EDITION_NUMBER: &str = "P393";
    pub const ARCHIVE_URL: &str = "P1065";
    pub const PUBLICATION_DATE: &str = "P577";
}

/// Properties the bot writes, advertised in the run log header.
pub const BOT_PROPERTIES: &[&str] = &[
    props::SUBCLASS_OF,
    props::HAS_CAUSE,
    props::INSTANCE_OF,
    props::EXACT_MATCH,
    props::ORPHANET_ID,
    props::UMLS_CUI,
    props::DISEASE_ONTOLOGY_ID,
    props::ICD_10,
    props::ICD_9,
    props::MESH_ID,
    props::NCI_THESAURUS_ID,
    props::OMIM_ID,
];

/// Properties whose existing values are kept when a record is updated.
pub const APPEND_PROPERTIES: &[&str] = &[props::SUBCLASS_OF, props::INSTANCE_OF];

pub const ONTOLOGY_NAME: &str = "Disease Ontology";
pub const BOT_NAME: &str = "DOIDBot";
pub const BOT_TAGS: &[&str] = &["disease", "doid"];

pub const ROOT_DOID: &str = "DOID:4";
pub const OBO_PURL_BASE: &str = "http://purl.obolibrary.org/obo/";
pub const RESOLVER_URL_BASE: &str = "http://identifiers.org/doid/";
pub const WIKIPEDIA_XREF_PREFIX: &str = "url:http://en.wikipedia.org/wiki/";
pub const WIKIPEDIA_SITE: &str = "enwiki";

pub const DISEASE_ITEM: &str = "Q12136";
pub const DISEASE_ONTOLOGY_ITEM: &str = "Q5282129";
pub const EDITION_ITEM: &str = "Q3331189";
pub const MIRIAM_ITEM: &str = "Q16335166";
pub const MIRIAM_COLLECTION_URL: &str =
    "http://www.ebi.ac.uk/miriam/main/collections/MIR:00000233";

pub const CLASS_TYPE: &str = "CLASS";

pub mod obo_in_owl {
    pub const DATE: &str = "http://www.geneontology.org/formats/oboInOwl#date";
    pub const DEFAULT_NAMESPACE: &str =
        "http://www.geneontology.org/formats/oboInOwl#default-namespace";
    pub const HAS_OBO_NAMESPACE: &str =
        "http://www.geneontology.org/formats/oboInOwl#hasOBONamespace";
    pub const HAS_ALTERNATIVE_ID: &str =
        "http://www.geneontology.org/formats/oboInOwl#hasAlternativeId";
}

pub const RELEASE_DATE_FORMAT: &str = "%d:%m:%Y %H:%M";

/// Descriptions treated as placeholders that a definition may replace.
pub const GENERIC_DESCRIPTIONS: &[&str] = &["", "disease", "human disease"];
pub const FALLBACK_DESCRIPTION: &str = "human disease";
pub const MAX_DESCRIPTION_CHARS: usize = 250;

/// Graph predicate IRI -> relationship property.
pub static EDGE_PROPERTIES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // has_material_basis_in
        ("http://purl.obolibrary.org/obo/IDO_0000664", props::HAS_CAUSE),
        // located in
        ("http://purl.obolibrary.org/obo/RO_0001025", props::LOCATED_IN),
        ("is_a", props::SUBCLASS_OF),
    ])
});

/// Ontology cross-reference prefix -> external-ID property.
pub static XREF_PROPERTIES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("ORDO", props::ORPHANET_ID),
        ("UMLS_CUI", props::UMLS_CUI),
        ("DOID", props::DISEASE_ONTOLOGY_ID),
        ("ICD10CM", props::ICD_10),
        ("ICD9CM", props::ICD_9),
        ("MSH", props::MESH_ID),
        ("NCI", props::NCI_THESAURUS_ID),
        ("OMIM", props::OMIM_ID),
    ])
});

pub fn edge_property(predicate: &str) -> Option<&'static str> {
    EDGE_PROPERTIES.get(predicate).copied()
}

pub fn xref_property(prefix: &str) -> Option<&'static str> {
    XREF_PROPERTIES.get(prefix).copied()
}

/// Predicates whose targets a node depends on.
pub fn structural_predicates() -> Vec<&'static str> {
    let mut predicates: Vec<&'static str> = EDGE_PROPERTIES.keys().copied().collect();
    predicates.sort_unstable();
    predicates
}

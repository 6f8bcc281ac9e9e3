use std::collections::BTreeSet;

use crate::domain::vocabulary::{
    props, APPEND_PROPERTIES, FALLBACK_DESCRIPTION, GENERIC_DESCRIPTIONS, MAX_DESCRIPTION_CHARS,
    WIKIPEDIA_SITE,
};
use crate::domain::{ExternalKey, Statement};
use crate::knowledge_base::{RecordSnapshot, RecordUpdate, Sitelink};
use crate::ontology::GraphNode;

/// New English description for a record, or `None` to keep the current one.
///
/// Placeholder descriptions are replaced by the definition when it is short
/// enough. A missing description with no usable definition gets the
/// fallback; an existing placeholder is then left alone.
pub fn choose_description(current: Option<&str>, definition: Option<&str>) -> Option<String> {
    let current = current.map(|c| c.trim().to_lowercase()).unwrap_or_default();
    if !GENERIC_DESCRIPTIONS.contains(&current.as_str()) {
        return None;
    }

    let usable = definition
        .map(str::trim)
        .filter(|definition| !definition.is_empty())
        .filter(|definition| definition.chars().count() < MAX_DESCRIPTION_CHARS);
    match usable {
        Some(definition) => Some(definition.to_string()),
        None if current.is_empty() => Some(FALLBACK_DESCRIPTION.to_string()),
        None => None,
    }
}

pub fn assemble_update(
    node: &GraphNode,
    statements: Vec<Statement>,
    existing: Option<&RecordSnapshot>,
) -> RecordUpdate {
    let current_label = existing.and_then(|record| record.label.as_deref());
    let label = match current_label {
        Some(label) if !label.is_empty() => None,
        _ => node.label.clone().filter(|label| !label.is_empty()),
    };

    let description = choose_description(
        existing.and_then(|record| record.description.as_deref()),
        node.definition.as_deref(),
    );

    let aliases: BTreeSet<String> = node.synonyms.clone().unwrap_or_default();

    let sitelink = node.wiki_link.as_ref().map(|title| Sitelink {
        site: WIKIPEDIA_SITE.to_string(),
        title: title.clone(),
    });

    RecordUpdate {
        key: ExternalKey::new(props::DISEASE_ONTOLOGY_ID, node.doid.clone()),
        statements,
        append_properties: APPEND_PROPERTIES.iter().map(|p| p.to_string()).collect(),
        label,
        description,
        aliases,
        sitelink,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_descriptions_take_the_definition() {
        for current in [None, Some(""), Some("disease"), Some("Human Disease")] {
            assert_eq!(
                choose_description(current, Some("A respiratory disease.")).as_deref(),
                Some("A respiratory disease.")
            );
        }
    }

    #[test]
    fn long_or_missing_definitions_fall_back() {
        let long = "x".repeat(250);
        assert_eq!(
            choose_description(Some(""), Some(long.as_str())).as_deref(),
            Some("human disease")
        );
        assert_eq!(
            choose_description(None, None).as_deref(),
            Some("human disease")
        );
        // a placeholder already in place is kept rather than swapped for the fallback
        assert_eq!(choose_description(Some("disease"), Some(long.as_str())), None);
        assert_eq!(choose_description(Some("Human disease"), None), None);
        // length is counted in characters
        let accented = "é".repeat(200);
        assert_eq!(
            choose_description(None, Some(accented.as_str())),
            Some(accented.clone())
        );
    }

    #[test]
    fn curated_descriptions_are_kept() {
        assert_eq!(
            choose_description(Some("chronic lung disease"), Some("A disease.")),
            None
        );
    }

    #[test]
    fn label_is_only_set_when_absent() {
        let mut node = GraphNode::new("http://purl.obolibrary.org/obo/DOID_2841");
        node.label = Some("asthma".to_string());
        node.synonyms = Some(BTreeSet::from(["bronchial asthma".to_string()]));
        node.wiki_link = Some("Asthma".to_string());

        let update = assemble_update(&node, Vec::new(), None);
        assert_eq!(update.label.as_deref(), Some("asthma"));
        assert_eq!(update.key, ExternalKey::new("P699", "DOID:2841"));
        assert_eq!(update.append_properties, vec!["P279", "P31"]);
        assert!(update.aliases.contains("bronchial asthma"));
        assert_eq!(update.sitelink.as_ref().map(|s| s.site.as_str()), Some("enwiki"));

        let mut existing = RecordSnapshot::empty("Q35869");
        existing.label = Some("Asthma (disease)".to_string());
        existing.description = Some("long-term inflammatory disease".to_string());
        let update = assemble_update(&node, Vec::new(), Some(&existing));
        assert!(update.label.is_none());
        assert!(update.description.is_none());
    }
}

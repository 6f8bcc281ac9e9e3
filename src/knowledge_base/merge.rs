//! Claim merge planning shared by every knowledge-base implementation.
//!
//! A statement already present (same property, same value) is never added
//! twice; when it cites a source the stored claim does not, the stored claim
//! is rewritten with the statement's references. On properties that are not
//! additive, existing claims whose value this update does not produce are
//! removed; additive properties keep all existing claims.

use std::collections::{HashMap, HashSet};

use super::{ExistingClaim, RecordSnapshot, RecordUpdate};
use crate::domain::Statement;

/// An existing claim rewritten with a produced statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimUpdate {
    pub id: String,
    pub statement: Statement,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimPlan {
    pub add: Vec<Statement>,
    pub update: Vec<ClaimUpdate>,
    pub remove: Vec<String>,
}

impl ClaimPlan {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }
}

pub fn plan_claims(
    existing: &[ExistingClaim],
    statements: &[Statement],
    append_properties: &[String],
) -> ClaimPlan {
    let mut stored: HashMap<(&str, &str), &ExistingClaim> = HashMap::new();
    for claim in existing {
        stored
            .entry((claim.property.as_str(), claim.value.as_str()))
            .or_insert(claim);
    }

    let mut planned: HashSet<(&str, &str)> = HashSet::new();
    let mut add = Vec::new();
    let mut update = Vec::new();
    for statement in statements {
        let key = (statement.property.as_str(), statement.value.text());
        if !planned.insert(key) {
            continue;
        }
        match stored.get(&key) {
            None => add.push(statement.clone()),
            Some(claim) if !claim.cites_all(statement) => update.push(ClaimUpdate {
                id: claim.id.clone(),
                statement: statement.clone(),
            }),
            Some(_) => {}
        }
    }

    let replaced: HashSet<&str> = statements
        .iter()
        .map(|s| s.property.as_str())
        .filter(|property| !append_properties.iter().any(|p| p.as_str() == *property))
        .collect();

    let remove = existing
        .iter()
        .filter(|claim| replaced.contains(claim.property.as_str()))
        .filter(|claim| !planned.contains(&(claim.property.as_str(), claim.value.as_str())))
        .map(|claim| claim.id.clone())
        .collect();

    ClaimPlan { add, update, remove }
}

/// True when applying `update` with `plan` would leave `current` unchanged.
pub fn is_noop(update: &RecordUpdate, current: &RecordSnapshot, plan: &ClaimPlan) -> bool {
    plan.is_empty()
        && update
            .label
            .as_ref()
            .map_or(true, |label| current.label.as_ref() == Some(label))
        && update
            .description
            .as_ref()
            .map_or(true, |description| current.description.as_ref() == Some(description))
        && update.aliases.is_subset(&current.aliases)
        && update.sitelink.as_ref().map_or(true, |link| {
            current.sitelinks.get(&link.site) == Some(&link.title)
        })
}

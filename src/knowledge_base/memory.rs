use anyhow::{anyhow, bail, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::merge::{is_noop, plan_claims};
use super::{ExistingClaim, KnowledgeBase, RecordSnapshot, RecordUpdate};
use crate::domain::{ExternalKey, Release, Statement};

/// Knowledge base kept in process memory, with the same merge semantics
/// as the remote client. Used for dry runs and tests.
#[derive(Default)]
pub struct InMemoryKnowledgeBase {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    records: BTreeMap<String, RecordSnapshot>,
    releases: HashMap<(String, String), String>,
    next_record: u64,
    next_claim: u64,
    writes: usize,
    releases_created: usize,
    fail_releases: bool,
    rejected_keys: HashSet<String>,
}

impl MemoryState {
    fn allocate_record_id(&mut self) -> String {
        self.next_record += 1;
        format!("Q{}", self.next_record)
    }

    fn claims_from(&mut self, record_id: &str, statements: &[Statement]) -> Vec<ExistingClaim> {
        statements
            .iter()
            .map(|statement| {
                self.next_claim += 1;
                ExistingClaim::from_statement(format!("{}${}", record_id, self.next_claim), statement)
            })
            .collect()
    }
}

impl InMemoryKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record carrying the given `(property, value)` claims.
    pub fn insert_record(&self, label: &str, claims: &[(&str, &str)]) -> String {
        let mut state = self.state.lock();
        let id = state.allocate_record_id();
        let mut record = RecordSnapshot::empty(id.clone());
        record.label = Some(label.to_string());
        for (property, value) in claims {
            state.next_claim += 1;
            record.claims.push(ExistingClaim::new(
                format!("{}${}", id, state.next_claim),
                *property,
                *value,
            ));
        }
        state.records.insert(id.clone(), record);
        id
    }

    pub fn record(&self, id: &str) -> Option<RecordSnapshot> {
        self.state.lock().records.get(id).cloned()
    }

    pub fn records(&self) -> Vec<RecordSnapshot> {
        self.state.lock().records.values().cloned().collect()
    }

    /// Number of writes that changed a record.
    pub fn writes(&self) -> usize {
        self.state.lock().writes
    }

    pub fn releases_created(&self) -> usize {
        self.state.lock().releases_created
    }

    pub fn fail_releases(&self) {
        self.state.lock().fail_releases = true;
    }

    /// Makes every write for the record keyed by `value` fail.
    pub fn reject_writes_for(&self, value: &str) {
        self.state.lock().rejected_keys.insert(value.to_string());
    }
}

impl KnowledgeBase for InMemoryKnowledgeBase {
    fn id_mapping(&self, property: &str) -> Result<HashMap<String, String>> {
        let state = self.state.lock();
        let mut mapping = HashMap::new();
        for record in state.records.values() {
            for claim in record.claims_for(property) {
                mapping.insert(claim.value.clone(), record.id.clone());
            }
        }
        Ok(mapping)
    }

    fn find_record(&self, key: &ExternalKey) -> Result<Option<RecordSnapshot>> {
        let state = self.state.lock();
        Ok(state
            .records
            .values()
            .find(|record| record.has_claim(&key.property, &key.value))
            .cloned())
    }

    fn write_record(
        &self,
        update: &RecordUpdate,
        existing: Option<&RecordSnapshot>,
    ) -> Result<String> {
        let mut state = self.state.lock();
        if state.rejected_keys.contains(&update.key.value) {
            bail!("write rejected for {}", update.key);
        }

        let id = match existing {
            Some(snapshot) => {
                if !state.records.contains_key(&snapshot.id) {
                    return Err(anyhow!("record {} does not exist", snapshot.id));
                }
                snapshot.id.clone()
            }
            None => state.allocate_record_id(),
        };

        let current = state
            .records
            .get(&id)
            .cloned()
            .unwrap_or_else(|| RecordSnapshot::empty(id.clone()));
        let plan = plan_claims(&current.claims, &update.statements, &update.append_properties);
        if existing.is_some() && is_noop(update, &current, &plan) {
            return Ok(id);
        }

        let added = state.claims_from(&id, &plan.add);
        let mut record = current;
        record.claims.retain(|claim| !plan.remove.contains(&claim.id));
        for rewrite in &plan.update {
            if let Some(claim) = record.claims.iter_mut().find(|c| c.id == rewrite.id) {
                *claim = ExistingClaim::from_statement(rewrite.id.clone(), &rewrite.statement);
            }
        }
        record.claims.extend(added);
        if let Some(label) = &update.label {
            record.label = Some(label.clone());
        }
        if let Some(description) = &update.description {
            record.description = Some(description.clone());
        }
        record.aliases.extend(update.aliases.iter().cloned());
        if let Some(link) = &update.sitelink {
            record.sitelinks.insert(link.site.clone(), link.title.clone());
        }

        state.records.insert(id.clone(), record);
        state.writes += 1;
        Ok(id)
    }

    fn find_release(&self, release: &Release) -> Result<Option<String>> {
        let state = self.state.lock();
        if state.fail_releases {
            bail!("release store unavailable");
        }
        let key = (release.edition_of.clone(), release.edition.clone());
        Ok(state.releases.get(&key).cloned())
    }

    fn get_or_create_release(&self, release: &Release) -> Result<String> {
        if let Some(id) = self.find_release(release)? {
            return Ok(id);
        }

        let mut state = self.state.lock();
        let key = (release.edition_of.clone(), release.edition.clone());

        let id = state.allocate_record_id();
        let claims = state.claims_from(&id, &release.statements());
        let mut record = RecordSnapshot::empty(id.clone());
        record.label = Some(release.title.clone());
        record.description = Some(release.description.clone());
        record.claims = claims;
        state.records.insert(id.clone(), record);
        state.releases.insert(key, id.clone());
        state.releases_created += 1;
        Ok(id)
    }
}

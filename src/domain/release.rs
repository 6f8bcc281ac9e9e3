use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::statement::{Statement, Value};
use super::vocabulary::{props, DISEASE_ONTOLOGY_ITEM, EDITION_ITEM, ONTOLOGY_NAME};

/// Descriptor of the shared "release" record every reference points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub title: String,
    pub description: String,
    pub edition: String,
    pub edition_of: String,
    pub archive_url: String,
    pub published: NaiveDate,
}

impl Release {
    pub fn for_snapshot(date: NaiveDate, version: impl Into<String>) -> Self {
        let edition = date.format("%Y-%m-%d").to_string();
        Self {
            title: format!("{} release {}", ONTOLOGY_NAME, edition),
            description: format!("Release of the {}", ONTOLOGY_NAME),
            edition,
            edition_of: DISEASE_ONTOLOGY_ITEM.to_string(),
            archive_url: version.into(),
            published: date,
        }
    }

    pub fn statements(&self) -> Vec<Statement> {
        vec![
            Statement::new(props::INSTANCE_OF, Value::item(EDITION_ITEM)),
            Statement::new(props::EDITION_OF, Value::item(self.edition_of.clone())),
            Statement::new(props::EDITION_NUMBER, Value::string(self.edition.clone())),
            Statement::new(props::ARCHIVE_URL, Value::url(self.archive_url.clone())),
            Statement::new(props::PUBLICATION_DATE, Value::day(self.published)),
        ]
    }
}

use percent_encoding::percent_decode_str;

use crate::domain::vocabulary::OBO_PURL_BASE;

/// `http://purl.obolibrary.org/obo/DOID_4` -> `DOID:4`
pub fn short_id_from_iri(iri: &str) -> String {
    iri.rsplit('/').next().unwrap_or(iri).replace('_', ":")
}

/// `DOID:4` -> `http://purl.obolibrary.org/obo/DOID_4`
pub fn iri_from_short_id(short_id: &str) -> String {
    format!("{}{}", OBO_PURL_BASE, short_id.replace(':', "_"))
}

pub fn decode_wiki_title(encoded: &str) -> String {
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}

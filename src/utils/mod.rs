mod identifiers;

pub use identifiers::{decode_wiki_title, iri_from_short_id, short_id_from_iri};

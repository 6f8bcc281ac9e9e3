mod release;
mod statement;
pub mod vocabulary;

pub use release::Release;
pub use statement::{ExternalKey, Reference, Snak, Statement, Value, PRECISION_DAY};

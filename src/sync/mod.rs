mod mapping;
mod record;
mod statements;
mod synchronizer;

pub use mapping::IdMapping;
pub use record::{assemble_update, choose_description};
pub use statements::{resolver_reference, StatementBuilder};
pub use synchronizer::{NodeFailure, NodeOutcome, RunSummary, SyncOptions, Synchronizer};

pub mod executor;

pub use executor::{import_if_absent, ImportOutcome, ImportPaths};

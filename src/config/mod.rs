pub mod schema;

pub use schema::{Config, RedactionConfig, ScannerConfig, ValidatorConfig};

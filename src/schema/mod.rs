//! Schema document ingestion: serde mirrors, the parser and the optional
//! JSON Schema contract.

pub mod contract;
pub mod parser;
mod raw;

pub use contract::SchemaContract;
pub use parser::{
    DEFAULT_SCHEMA_VERSION, ENV_ALLOWED_SCHEMA_VERSIONS, SchemaParser, allowed_schema_versions,
};

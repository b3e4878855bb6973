//! JSON Schema contract for schema documents.
//!
//! Validating a document against the contract before parsing turns shape
//! errors into one report that names every offending JSON pointer, instead of
//! stopping at the first missing key.

use crate::error::{Result, TdiError};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;

const BUNDLED_CONTRACT: &str = include_str!("../../schema/tdi_info.schema.json");

pub struct SchemaContract {
    compiled: JSONSchema,
    origin: String,
}

impl SchemaContract {
    /// The contract shipped with the crate.
    pub fn bundled() -> Result<Self> {
        let value: Value = serde_json::from_str(BUNDLED_CONTRACT)
            .map_err(|err| TdiError::internal(format!("bundled contract is not JSON: {err}")))?;
        Self::from_value(&value, "bundled tdi_info contract")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            TdiError::io(format!("opening contract {}: {err}", path.display()))
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|err| {
            TdiError::io(format!("parsing contract {}: {err}", path.display()))
        })?;
        Self::from_value(&value, &path.display().to_string())
    }

    pub fn from_value(value: &Value, origin: &str) -> Result<Self> {
        let compiled = JSONSchema::compile(value).map_err(|err| {
            TdiError::invalid_argument(format!("compiling contract {origin}: {err}"))
        })?;
        Ok(Self {
            compiled,
            origin: origin.to_string(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Check `document`, reporting every violation at once.
    pub fn validate(&self, document: &Value) -> Result<()> {
        if let Err(errors) = self.compiled.validate(document) {
            let details = errors
                .map(|err| format!("{} at {}", err, err.instance_path))
                .collect::<Vec<_>>()
                .join("\n");
            return Err(TdiError::invalid_argument(format!(
                "document failed {} validation:\n{details}",
                self.origin
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for SchemaContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaContract")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

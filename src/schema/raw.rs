//! Serde mirrors of the schema document. Nothing here is validated beyond
//! shape; the parser turns these into catalog descriptors.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub(crate) struct RawAnnotation {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawDependency {
    Id(u32),
    Name(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawType {
    #[serde(rename = "type")]
    pub type_name: String,
    pub width: Option<usize>,
    pub default_value: Option<Value>,
    #[serde(default)]
    pub choices: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawKeyField {
    pub id: u32,
    pub name: String,
    pub match_type: String,
    #[serde(rename = "type")]
    pub field_type: RawType,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub repeated: bool,
    #[serde(default)]
    pub annotations: Vec<RawAnnotation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDataField {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: Option<RawType>,
    pub container: Option<Value>,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub repeated: bool,
    #[serde(default)]
    pub annotations: Vec<RawAnnotation>,
}

/// One entry of a `data` array: a plain field, a `singleton` wrapper, or a
/// `oneof` group whose members exclude each other.
#[derive(Debug)]
pub(crate) enum RawDataEntry {
    Singleton {
        mandatory: bool,
        read_only: bool,
        singleton: RawDataField,
    },
    OneOf {
        mandatory: bool,
        read_only: bool,
        oneof: Vec<RawDataField>,
    },
    Field(RawDataField),
}

#[derive(Deserialize)]
struct RawSingleton {
    #[serde(default)]
    mandatory: bool,
    #[serde(default)]
    read_only: bool,
    singleton: RawDataField,
}

#[derive(Deserialize)]
struct RawOneOf {
    #[serde(default)]
    mandatory: bool,
    #[serde(default)]
    read_only: bool,
    oneof: Vec<RawDataField>,
}

// The variant is picked from the wrapper key so a malformed entry reports the
// field and the serde error instead of a generic no-variant-matched message.
impl<'de> Deserialize<'de> for RawDataEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let describe = |err: serde_json::Error, name: Option<&Value>| {
            match name.and_then(Value::as_str) {
                Some(name) => D::Error::custom(format!("data field '{name}': {err}")),
                None => D::Error::custom(format!("data entry: {err}")),
            }
        };
        if let Some(inner) = value.get("singleton") {
            let name = inner.get("name").cloned();
            let raw = RawSingleton::deserialize(&value).map_err(|e| describe(e, name.as_ref()))?;
            return Ok(RawDataEntry::Singleton {
                mandatory: raw.mandatory,
                read_only: raw.read_only,
                singleton: raw.singleton,
            });
        }
        if value.get("oneof").is_some() {
            let raw = RawOneOf::deserialize(&value).map_err(|e| describe(e, None))?;
            return Ok(RawDataEntry::OneOf {
                mandatory: raw.mandatory,
                read_only: raw.read_only,
                oneof: raw.oneof,
            });
        }
        RawDataField::deserialize(&value)
            .map(RawDataEntry::Field)
            .map_err(|e| describe(e, value.get("name")))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAction {
    pub id: u32,
    pub name: String,
    pub action_scope: Option<String>,
    #[serde(default)]
    pub annotations: Vec<RawAnnotation>,
    #[serde(default)]
    pub data: Vec<RawDataEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTable {
    pub name: String,
    pub id: u32,
    pub table_type: String,
    pub size: usize,
    #[serde(default)]
    pub annotations: Vec<RawAnnotation>,
    #[serde(default)]
    pub depends_on: Vec<RawDependency>,
    #[serde(default)]
    pub has_const_default_action: bool,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub key: Vec<RawKeyField>,
    #[serde(default)]
    pub action_specs: Vec<RawAction>,
    #[serde(default)]
    pub data: Vec<RawDataEntry>,
    #[serde(default)]
    pub supported_operations: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLearn {
    pub name: String,
    pub id: u32,
    #[serde(default)]
    pub annotations: Vec<RawAnnotation>,
    #[serde(default)]
    pub fields: Vec<RawDataEntry>,
}

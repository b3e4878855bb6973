//! Immutable descriptors produced by the schema parser.
//!
//! Everything in this module is owned by a [`crate::Catalog`] once parsing
//! finishes; callers only ever see shared references. Fields keep schema
//! order, while id and name lookups go through a small index.

use crate::error::{Result, TdiError};
use crate::mapper::{AttributesType, MatchType, OperationsType, TableType};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type TableId = u32;
pub type LearnId = u32;
pub type FieldId = u32;
pub type ActionId = u32;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Annotation {
    pub name: String,
    pub value: String,
}

impl Annotation {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.name, self.value)
    }
}

/// Value kind of a key or data field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DataType {
    Uint64,
    Int64,
    Bytes,
    Float,
    Bool,
    String,
    IntArr,
    BoolArr,
    StringArr,
    Container,
}

impl DataType {
    /// Resolve a schema `type.type` string. `repeated` selects the array kinds.
    pub fn from_schema(type_name: &str, repeated: bool) -> Option<(DataType, usize)> {
        let int_kind = if repeated {
            DataType::IntArr
        } else {
            DataType::Uint64
        };
        let signed_kind = if repeated {
            DataType::IntArr
        } else {
            DataType::Int64
        };
        let resolved = match type_name {
            "bytes" => (DataType::Bytes, 0),
            "uint64" => (int_kind, 64),
            "uint32" => (int_kind, 32),
            "uint16" => (int_kind, 16),
            "uint8" => (int_kind, 8),
            "int64" => (signed_kind, 64),
            "int32" => (signed_kind, 32),
            "int16" => (signed_kind, 16),
            "int8" => (signed_kind, 8),
            "bool" if repeated => (DataType::BoolArr, 1),
            "bool" => (DataType::Bool, 1),
            "float" => (DataType::Float, 0),
            "string" if repeated => (DataType::StringArr, 0),
            "string" => (DataType::String, 0),
            _ => return None,
        };
        Some(resolved)
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            DataType::IntArr | DataType::BoolArr | DataType::StringArr
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Uint64 => "uint64",
            DataType::Int64 => "int64",
            DataType::Bytes => "bytes",
            DataType::Float => "float",
            DataType::Bool => "bool",
            DataType::String => "string",
            DataType::IntArr => "int array",
            DataType::BoolArr => "bool array",
            DataType::StringArr => "string array",
            DataType::Container => "container",
        };
        f.write_str(name)
    }
}

/// Default value, typed to match the field's [`DataType`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum DefaultValue {
    Uint(u64),
    Int(i64),
    Float(f32),
    Bool(bool),
    Str(String),
    /// Arrays and containers carry no scalar default.
    Empty,
}

/// Behaviour shared by everything stored in a [`FieldSet`].
pub trait Named {
    fn id(&self) -> u32;
    fn name(&self) -> &str;
}

/// Schema-ordered collection with id and name indexes.
#[derive(Clone, Debug, Serialize)]
#[serde(transparent)]
pub struct FieldSet<T> {
    items: Vec<T>,
    #[serde(skip)]
    by_id: BTreeMap<u32, usize>,
    #[serde(skip)]
    by_name: BTreeMap<String, usize>,
}

impl<T> Default for FieldSet<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            by_id: BTreeMap::new(),
            by_name: BTreeMap::new(),
        }
    }
}

impl<T: Named> FieldSet<T> {
    /// Append `item`; ids must be unique within the set.
    pub fn push(&mut self, item: T) -> Result<()> {
        if self.by_id.contains_key(&item.id()) {
            return Err(TdiError::already_exists(format!(
                "id {} ('{}') is declared more than once",
                item.id(),
                item.name()
            )));
        }
        let idx = self.items.len();
        self.by_id.insert(item.id(), idx);
        self.by_name.entry(item.name().to_string()).or_insert(idx);
        self.items.push(item);
        Ok(())
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.by_id.get(&id).map(|idx| &self.items[*idx])
    }

    pub fn by_name(&self, name: &str) -> Option<&T> {
        self.by_name.get(name).map(|idx| &self.items[*idx])
    }

    pub fn contains(&self, id: u32) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> Vec<u32> {
        self.by_id.keys().copied().collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a, T> IntoIterator for &'a FieldSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct KeyFieldInfo {
    pub id: FieldId,
    pub name: String,
    pub match_type: MatchType,
    pub data_type: DataType,
    /// Declared width in bits.
    pub width: usize,
    pub mandatory: bool,
    pub repeated: bool,
    pub choices: Vec<String>,
    pub default_value: DefaultValue,
    pub annotations: BTreeSet<Annotation>,
    pub is_field_slice: bool,
}

impl KeyFieldInfo {
    /// Fields wider than 64 bits only accept byte-array values.
    pub fn is_ptr(&self) -> bool {
        self.width > 64
    }

    pub fn byte_len(&self) -> usize {
        self.width.div_ceil(8)
    }
}

impl Named for KeyFieldInfo {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DataFieldInfo {
    pub id: FieldId,
    pub name: String,
    pub data_type: DataType,
    /// Declared width in bits; zero for float, string and container kinds.
    pub width: usize,
    pub default_value: DefaultValue,
    pub mandatory: bool,
    pub read_only: bool,
    pub repeated: bool,
    pub choices: Vec<String>,
    pub annotations: BTreeSet<Annotation>,
    /// Other members of the same `oneof` group.
    pub oneof_siblings: BTreeSet<FieldId>,
    pub action_id: Option<ActionId>,
}

impl DataFieldInfo {
    pub fn is_ptr(&self) -> bool {
        self.width > 64
    }

    pub fn byte_len(&self) -> usize {
        self.width.div_ceil(8)
    }

    pub fn is_container(&self) -> bool {
        self.data_type == DataType::Container
    }
}

impl Named for DataFieldInfo {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ActionScope {
    TableAndDefault,
    TableOnly,
    DefaultOnly,
}

impl ActionScope {
    pub fn from_schema(value: &str) -> Option<Self> {
        match value {
            "TableAndDefault" => Some(ActionScope::TableAndDefault),
            "TableOnly" => Some(ActionScope::TableOnly),
            "DefaultOnly" => Some(ActionScope::DefaultOnly),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ActionInfo {
    pub id: ActionId,
    pub name: String,
    pub scope: ActionScope,
    pub annotations: BTreeSet<Annotation>,
    pub data_fields: FieldSet<DataFieldInfo>,
}

impl ActionInfo {
    /// Data field ids in schema order.
    pub fn data_field_order(&self) -> Vec<FieldId> {
        self.data_fields.iter().map(|f| f.id).collect()
    }
}

impl Named for ActionInfo {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A table as declared in the schema, plus the relations the catalog derives.
#[derive(Clone, Debug, Serialize)]
pub struct TableInfo {
    pub id: TableId,
    pub name: String,
    pub table_type: TableType,
    pub size: usize,
    pub has_const_default_action: bool,
    pub is_const: bool,
    pub key_fields: FieldSet<KeyFieldInfo>,
    pub common_data: FieldSet<DataFieldInfo>,
    pub actions: FieldSet<ActionInfo>,
    pub depends_on: BTreeSet<TableId>,
    pub dependents: BTreeSet<TableId>,
    pub operations: BTreeSet<OperationsType>,
    pub attributes: BTreeSet<AttributesType>,
    pub annotations: BTreeSet<Annotation>,
    /// Unambiguous shortened names; filled in when the catalog is frozen.
    pub aliases: BTreeSet<String>,
}

impl TableInfo {
    pub fn key_field(&self, id: FieldId) -> Result<&KeyFieldInfo> {
        self.key_fields.get(id).ok_or_else(|| {
            TdiError::not_found(format!("{}: key field id {id} not found", self.name))
        })
    }

    pub fn key_field_by_name(&self, name: &str) -> Result<&KeyFieldInfo> {
        self.key_fields.by_name(name).ok_or_else(|| {
            TdiError::not_found(format!("{}: key field '{name}' not found", self.name))
        })
    }

    pub fn key_field_ids(&self) -> Vec<FieldId> {
        self.key_fields.ids()
    }

    /// Look up a data field, searching the action's fields before common data.
    pub fn data_field(&self, id: FieldId, action_id: Option<ActionId>) -> Result<&DataFieldInfo> {
        if let Some(action) = action_id.and_then(|a| self.actions.get(a)) {
            if let Some(field) = action.data_fields.get(id) {
                return Ok(field);
            }
        }
        self.common_data.get(id).ok_or_else(|| {
            TdiError::not_found(format!(
                "{}: data field id {id} not found{}",
                self.name,
                action_suffix(action_id)
            ))
        })
    }

    pub fn data_field_by_name(
        &self,
        name: &str,
        action_id: Option<ActionId>,
    ) -> Result<&DataFieldInfo> {
        if let Some(action) = action_id.and_then(|a| self.actions.get(a)) {
            if let Some(field) = action.data_fields.by_name(name) {
                return Ok(field);
            }
        }
        self.common_data.by_name(name).ok_or_else(|| {
            TdiError::not_found(format!(
                "{}: data field '{name}' not found{}",
                self.name,
                action_suffix(action_id)
            ))
        })
    }

    /// Sorted data field ids for `action_id` plus the common data fields.
    pub fn data_field_ids(&self, action_id: Option<ActionId>) -> Result<Vec<FieldId>> {
        let mut ids = match action_id {
            Some(id) => self.action(id)?.data_fields.ids(),
            None => Vec::new(),
        };
        ids.extend(self.common_data.ids());
        ids.sort_unstable();
        Ok(ids)
    }

    pub fn action(&self, id: ActionId) -> Result<&ActionInfo> {
        self.actions.get(id).ok_or_else(|| {
            TdiError::not_found(format!("{}: action id {id} not found", self.name))
        })
    }

    pub fn action_by_name(&self, name: &str) -> Result<&ActionInfo> {
        self.actions.by_name(name).ok_or_else(|| {
            TdiError::not_found(format!("{}: action '{name}' not found", self.name))
        })
    }

    pub fn action_ids(&self) -> Vec<ActionId> {
        self.actions.ids()
    }

    pub fn has_actions(&self) -> bool {
        !self.actions.is_empty()
    }
}

fn action_suffix(action_id: Option<ActionId>) -> String {
    action_id
        .map(|a| format!(" for action {a}"))
        .unwrap_or_default()
}

impl Named for TableInfo {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Digest schema: a flat list of fields delivered asynchronously.
#[derive(Clone, Debug, Serialize)]
pub struct LearnInfo {
    pub id: LearnId,
    pub name: String,
    pub fields: FieldSet<DataFieldInfo>,
    pub annotations: BTreeSet<Annotation>,
    pub aliases: BTreeSet<String>,
}

impl LearnInfo {
    pub fn field(&self, id: FieldId) -> Result<&DataFieldInfo> {
        self.fields.get(id).ok_or_else(|| {
            TdiError::not_found(format!("{}: learn field id {id} not found", self.name))
        })
    }

    pub fn field_by_name(&self, name: &str) -> Result<&DataFieldInfo> {
        self.fields.by_name(name).ok_or_else(|| {
            TdiError::not_found(format!("{}: learn field '{name}' not found", self.name))
        })
    }

    pub fn field_ids(&self) -> Vec<FieldId> {
        self.fields.ids()
    }

    /// Total digest size: every field packed at its byte-rounded width.
    pub fn message_size_bytes(&self) -> usize {
        self.fields.iter().map(DataFieldInfo::byte_len).sum()
    }
}

impl Named for LearnInfo {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

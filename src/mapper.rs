//! Enum-string mapping used while parsing schema documents.
//!
//! Schema files name table types, match types, operations and attributes by
//! string. A mapping is assembled once with [`EnumMapperBuilder`] from the core
//! entries plus whatever an architecture or target registers, and is immutable
//! afterwards. Registration rejects a string or code that is already taken so
//! the mapping stays injective.

use crate::error::{Result, TdiError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Code ranges reserved for each layer of the stack.
pub mod ranges {
    pub const MATCH_TYPE_CORE: u32 = 0x00;
    pub const MATCH_TYPE_ARCH: u32 = 0x08;
    pub const MATCH_TYPE_DEVICE: u32 = 0x80;

    pub const TABLE_TYPE_CORE: u32 = 0x0000;
    pub const TABLE_TYPE_ARCH: u32 = 0x0080;
    pub const TABLE_TYPE_DEVICE: u32 = 0x0800;

    pub const OPERATIONS_TYPE_CORE: u32 = 0x00;
    pub const OPERATIONS_TYPE_ARCH: u32 = 0x08;
    pub const OPERATIONS_TYPE_DEVICE: u32 = 0x80;

    pub const ATTRIBUTES_TYPE_CORE: u32 = 0x00;
    pub const ATTRIBUTES_TYPE_ARCH: u32 = 0x08;
    pub const ATTRIBUTES_TYPE_DEVICE: u32 = 0x80;
}

/// Codec family a match type is encoded with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MatchKind {
    Exact,
    Ternary,
    Lpm,
    Range,
    Optional,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::Exact => "Exact",
            MatchKind::Ternary => "Ternary",
            MatchKind::Lpm => "LPM",
            MatchKind::Range => "Range",
            MatchKind::Optional => "Optional",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered match type: numeric code plus the codec family it uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MatchType {
    pub code: u32,
    pub kind: MatchKind,
}

impl MatchType {
    pub const EXACT: MatchType = MatchType::new(ranges::MATCH_TYPE_CORE, MatchKind::Exact);
    pub const TERNARY: MatchType = MatchType::new(ranges::MATCH_TYPE_CORE + 1, MatchKind::Ternary);
    pub const LPM: MatchType = MatchType::new(ranges::MATCH_TYPE_CORE + 2, MatchKind::Lpm);

    pub const fn new(code: u32, kind: MatchKind) -> Self {
        Self { code, kind }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TableType(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OperationsType(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AttributesType(pub u32);

/// Core match-type strings, always present.
pub const CORE_MATCH_TYPES: &[(&str, MatchType)] = &[
    ("Exact", MatchType::EXACT),
    ("Ternary", MatchType::TERNARY),
    ("LPM", MatchType::LPM),
];

/// Extension pairs contributed by an architecture or a target.
#[derive(Clone, Debug, Default)]
pub struct MapperExtension {
    pub match_types: Vec<(String, MatchType)>,
    pub table_types: Vec<(String, TableType)>,
    pub operations: Vec<(String, OperationsType)>,
    pub attributes: Vec<(String, AttributesType)>,
}

impl MapperExtension {
    pub fn match_type(mut self, name: &str, match_type: MatchType) -> Self {
        self.match_types.push((name.to_string(), match_type));
        self
    }

    pub fn table_type(mut self, name: &str, table_type: TableType) -> Self {
        self.table_types.push((name.to_string(), table_type));
        self
    }

    pub fn operation(mut self, name: &str, operation: OperationsType) -> Self {
        self.operations.push((name.to_string(), operation));
        self
    }

    pub fn attribute(mut self, name: &str, attribute: AttributesType) -> Self {
        self.attributes.push((name.to_string(), attribute));
        self
    }
}

#[derive(Clone, Debug)]
pub struct EnumMapperBuilder {
    table_types: BTreeMap<String, TableType>,
    match_types: BTreeMap<String, MatchType>,
    operations: BTreeMap<String, OperationsType>,
    attributes: BTreeMap<String, AttributesType>,
}

impl Default for EnumMapperBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EnumMapperBuilder {
    /// Builder seeded with the core match types.
    pub fn new() -> Self {
        let mut builder = Self::empty();
        for (name, match_type) in CORE_MATCH_TYPES {
            builder.match_types.insert((*name).to_string(), *match_type);
        }
        builder
    }

    pub fn empty() -> Self {
        Self {
            table_types: BTreeMap::new(),
            match_types: BTreeMap::new(),
            operations: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn match_type(&mut self, name: &str, match_type: MatchType) -> Result<&mut Self> {
        insert_unique(&mut self.match_types, "match type", name, match_type, |m| m.code)?;
        Ok(self)
    }

    pub fn table_type(&mut self, name: &str, table_type: TableType) -> Result<&mut Self> {
        insert_unique(&mut self.table_types, "table type", name, table_type, |t| t.0)?;
        Ok(self)
    }

    pub fn operations_type(&mut self, name: &str, operation: OperationsType) -> Result<&mut Self> {
        insert_unique(&mut self.operations, "operations type", name, operation, |o| o.0)?;
        Ok(self)
    }

    pub fn attributes_type(&mut self, name: &str, attribute: AttributesType) -> Result<&mut Self> {
        insert_unique(&mut self.attributes, "attributes type", name, attribute, |a| a.0)?;
        Ok(self)
    }

    /// Register every pair of `extension`, stopping at the first duplicate.
    pub fn extend(&mut self, extension: &MapperExtension) -> Result<&mut Self> {
        for (name, value) in &extension.match_types {
            self.match_type(name, *value)?;
        }
        for (name, value) in &extension.table_types {
            self.table_type(name, *value)?;
        }
        for (name, value) in &extension.operations {
            self.operations_type(name, *value)?;
        }
        for (name, value) in &extension.attributes {
            self.attributes_type(name, *value)?;
        }
        Ok(self)
    }

    pub fn build(self) -> EnumMapper {
        EnumMapper {
            table_types: self.table_types,
            match_types: self.match_types,
            operations: self.operations,
            attributes: self.attributes,
        }
    }
}

fn insert_unique<V: Copy>(
    map: &mut BTreeMap<String, V>,
    what: &str,
    name: &str,
    value: V,
    code: impl Fn(&V) -> u32,
) -> Result<()> {
    if map.contains_key(name) {
        return Err(TdiError::already_exists(format!(
            "{what} '{name}' is already registered"
        )));
    }
    let new_code = code(&value);
    if let Some((other, _)) = map.iter().find(|(_, v)| code(*v) == new_code) {
        return Err(TdiError::already_exists(format!(
            "{what} code {new_code:#x} already registered for '{other}', cannot map '{name}'"
        )));
    }
    map.insert(name.to_string(), value);
    Ok(())
}

/// Immutable string-to-code mapping consulted by the schema parser.
#[derive(Clone, Debug)]
pub struct EnumMapper {
    table_types: BTreeMap<String, TableType>,
    match_types: BTreeMap<String, MatchType>,
    operations: BTreeMap<String, OperationsType>,
    attributes: BTreeMap<String, AttributesType>,
}

impl Default for EnumMapper {
    fn default() -> Self {
        EnumMapperBuilder::new().build()
    }
}

impl EnumMapper {
    pub fn builder() -> EnumMapperBuilder {
        EnumMapperBuilder::new()
    }

    pub fn match_type(&self, name: &str) -> Result<MatchType> {
        self.match_types
            .get(name)
            .copied()
            .ok_or_else(|| TdiError::invalid_argument(format!("unknown match type '{name}'")))
    }

    pub fn table_type(&self, name: &str) -> Result<TableType> {
        self.table_types
            .get(name)
            .copied()
            .ok_or_else(|| TdiError::invalid_argument(format!("unknown table type '{name}'")))
    }

    pub fn operations_type(&self, name: &str) -> Option<OperationsType> {
        self.operations.get(name).copied()
    }

    pub fn attributes_type(&self, name: &str) -> Option<AttributesType> {
        self.attributes.get(name).copied()
    }

    pub fn match_type_name(&self, match_type: MatchType) -> Option<&str> {
        self.match_types
            .iter()
            .find(|(_, v)| **v == match_type)
            .map(|(k, _)| k.as_str())
    }

    pub fn table_type_name(&self, table_type: TableType) -> Option<&str> {
        self.table_types
            .iter()
            .find(|(_, v)| **v == table_type)
            .map(|(k, _)| k.as_str())
    }

    pub fn match_types(&self) -> impl Iterator<Item = (&str, MatchType)> {
        self.match_types.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn table_types(&self) -> impl Iterator<Item = (&str, TableType)> {
        self.table_types.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;

    #[test]
    fn core_match_types_are_preregistered() {
        let mapper = EnumMapper::default();
        assert_eq!(mapper.match_type("Exact").unwrap(), MatchType::EXACT);
        assert_eq!(mapper.match_type("Ternary").unwrap().kind, MatchKind::Ternary);
        assert_eq!(mapper.match_type("LPM").unwrap().kind, MatchKind::Lpm);
        let err = mapper.match_type("Range").unwrap_err();
        assert_eq!(err.status(), Status::InvalidArgument);
    }

    #[test]
    fn registering_existing_string_fails() {
        let mut builder = EnumMapperBuilder::new();
        let err = builder
            .match_type("Exact", MatchType::new(0x40, MatchKind::Exact))
            .unwrap_err();
        assert_eq!(err.status(), Status::AlreadyExists);
    }

    #[test]
    fn registering_existing_code_fails() {
        let mut builder = EnumMapperBuilder::new();
        let err = builder.match_type("Exact2", MatchType::EXACT).unwrap_err();
        assert_eq!(err.status(), Status::AlreadyExists);
    }

    #[test]
    fn extension_pairs_land_in_the_built_mapping() {
        let ext = MapperExtension::default()
            .match_type("Range", MatchType::new(ranges::MATCH_TYPE_ARCH, MatchKind::Range))
            .table_type("MatchAction_Direct", TableType(ranges::TABLE_TYPE_DEVICE));
        let mut builder = EnumMapperBuilder::new();
        builder.extend(&ext).unwrap();
        let mapper = builder.build();
        assert_eq!(mapper.match_type("Range").unwrap().kind, MatchKind::Range);
        assert_eq!(
            mapper.table_type("MatchAction_Direct").unwrap(),
            TableType(ranges::TABLE_TYPE_DEVICE)
        );
        assert_eq!(
            mapper.table_type_name(TableType(ranges::TABLE_TYPE_DEVICE)),
            Some("MatchAction_Direct")
        );
    }
}

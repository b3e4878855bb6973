//! Target profiles: the table types a target knows and the kind each maps to.

use crate::catalog::{TableFactory, TableKind};
use crate::error::Result;
use crate::mapper::{AttributesType, MapperExtension, OperationsType, TableType, ranges};
use std::collections::BTreeMap;

/// Table-type strings registered by a target together with their kinds.
#[derive(Clone, Debug)]
pub struct TargetProfile {
    name: String,
    extension: MapperExtension,
    kinds: BTreeMap<TableType, TableKind>,
}

impl TargetProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extension: MapperExtension::default(),
            kinds: BTreeMap::new(),
        }
    }

    /// Register a table-type string, its code and the kind built for it.
    pub fn table(mut self, type_name: &str, table_type: TableType, kind: TableKind) -> Self {
        self.extension = self.extension.table_type(type_name, table_type);
        self.kinds.insert(table_type, kind);
        self
    }

    /// Additional mapper entries (operations, attributes, match types).
    pub fn with_extension(mut self, extension: MapperExtension) -> Self {
        let MapperExtension {
            match_types,
            table_types,
            operations,
            attributes,
        } = extension;
        self.extension.match_types.extend(match_types);
        self.extension.table_types.extend(table_types);
        self.extension.operations.extend(operations);
        self.extension.attributes.extend(attributes);
        self
    }

    /// The reference target used when no hardware target is configured.
    pub fn dummy() -> Self {
        let device = ranges::TABLE_TYPE_DEVICE;
        Self::new("dummy")
            .table("MatchAction_Direct", TableType(device), TableKind::MatchDirect)
            .table("MatchAction_Indirect", TableType(device + 1), TableKind::MatchIndirect)
            .table(
                "MatchAction_Indirect_Selector",
                TableType(device + 2),
                TableKind::MatchIndirectSelector,
            )
            .table("Action", TableType(device + 3), TableKind::ActionProfile)
            .table("Selector", TableType(device + 4), TableKind::Selector)
            .table("Counter", TableType(device + 5), TableKind::Counter)
            .table("Meter", TableType(device + 6), TableKind::Meter)
            .table("Register", TableType(device + 7), TableKind::Register)
            .table("PortConfigure", TableType(device + 8), TableKind::PortConfig)
            .table("PortStat", TableType(device + 9), TableKind::PortStat)
            .with_extension(
                MapperExtension::default()
                    .operation("Sync", OperationsType(ranges::OPERATIONS_TYPE_DEVICE))
                    .attribute("EntryScope", AttributesType(ranges::ATTRIBUTES_TYPE_DEVICE))
                    .attribute(
                        "IdleTimeout",
                        AttributesType(ranges::ATTRIBUTES_TYPE_DEVICE + 1),
                    ),
            )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> &MapperExtension {
        &self.extension
    }

    /// Check the registered pairs are injective on their own.
    pub fn validate(&self) -> Result<()> {
        let mut builder = crate::mapper::EnumMapperBuilder::empty();
        builder.extend(&self.extension)?;
        Ok(())
    }
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self::dummy()
    }
}

impl TableFactory for TargetProfile {
    fn table_kind(&self, table_type: TableType) -> Option<TableKind> {
        self.kinds.get(&table_type).copied()
    }
}

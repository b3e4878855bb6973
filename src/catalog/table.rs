//! Table and learn handles, plus the per-kind capability sets.

use crate::catalog::info::{ActionId, FieldId, LearnInfo, TableInfo};
use crate::codec::{TableData, TableKey};
use crate::device::Target;
use crate::error::{Result, TdiError};
use crate::learn::{LearnBackend, LearnCallback, LearnMsgHandle};
use crate::mapper::TableType;
use crate::session::Session;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Concrete behaviour family of a table, chosen per table type by a
/// [`TableFactory`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TableKind {
    MatchDirect,
    MatchIndirect,
    MatchIndirectSelector,
    ActionProfile,
    Selector,
    Counter,
    Meter,
    Register,
    PortConfig,
    PortStat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TableApi {
    EntryAdd,
    EntryModify,
    EntryDelete,
    EntryGet,
    EntryGetFirst,
    EntryGetNextN,
    UsageGet,
    SizeGet,
    Clear,
    DefaultEntrySet,
    DefaultEntryGet,
    DefaultEntryReset,
    AttributeSet,
    AttributeGet,
    OperationsExecute,
}

/// What a table kind can do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub key: bool,
    pub data: bool,
    pub action_data: bool,
    pub default_entry: bool,
    pub writable: bool,
    pub attributes: bool,
    pub operations: bool,
}

impl TableKind {
    pub fn capabilities(self) -> Capabilities {
        let base = Capabilities {
            key: true,
            data: true,
            action_data: false,
            default_entry: false,
            writable: true,
            attributes: false,
            operations: false,
        };
        match self {
            TableKind::MatchDirect => Capabilities {
                action_data: true,
                default_entry: true,
                attributes: true,
                operations: true,
                ..base
            },
            TableKind::MatchIndirect | TableKind::MatchIndirectSelector => Capabilities {
                default_entry: true,
                attributes: true,
                ..base
            },
            TableKind::ActionProfile => Capabilities {
                action_data: true,
                ..base
            },
            TableKind::Counter | TableKind::Register => Capabilities {
                operations: true,
                ..base
            },
            TableKind::Selector | TableKind::Meter | TableKind::PortConfig => base,
            TableKind::PortStat => Capabilities {
                writable: false,
                ..base
            },
        }
    }

    pub fn supported_apis(self) -> BTreeSet<TableApi> {
        let caps = self.capabilities();
        let mut apis: BTreeSet<TableApi> = [
            TableApi::EntryGet,
            TableApi::EntryGetFirst,
            TableApi::EntryGetNextN,
            TableApi::UsageGet,
            TableApi::SizeGet,
            TableApi::Clear,
        ]
        .into_iter()
        .collect();
        if caps.writable {
            apis.extend([TableApi::EntryAdd, TableApi::EntryModify, TableApi::EntryDelete]);
        }
        if caps.default_entry {
            apis.extend([
                TableApi::DefaultEntrySet,
                TableApi::DefaultEntryGet,
                TableApi::DefaultEntryReset,
            ]);
        }
        if caps.attributes {
            apis.extend([TableApi::AttributeSet, TableApi::AttributeGet]);
        }
        if caps.operations {
            apis.insert(TableApi::OperationsExecute);
        }
        apis
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Selects the [`TableKind`] for each parsed table.
pub trait TableFactory: Send + Sync {
    fn table_kind(&self, table_type: TableType) -> Option<TableKind>;
}

/// A catalog table: its descriptor and the kind that decides its capabilities.
#[derive(Debug, Serialize)]
pub struct Table {
    info: TableInfo,
    kind: TableKind,
}

impl Table {
    pub(crate) fn new(info: TableInfo, kind: TableKind) -> Self {
        Self { info, kind }
    }

    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    pub(crate) fn info_mut(&mut self) -> &mut TableInfo {
        &mut self.info
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn id(&self) -> u32 {
        self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn supported_apis(&self) -> BTreeSet<TableApi> {
        self.kind.supported_apis()
    }

    pub fn is_api_supported(&self, api: TableApi) -> bool {
        self.supported_apis().contains(&api)
    }

    /// Fails with NotSupported when this table's kind lacks `api`.
    pub fn ensure_supported(&self, api: TableApi) -> Result<()> {
        if self.is_api_supported(api) {
            Ok(())
        } else {
            Err(TdiError::not_supported(format!(
                "{:?} is not supported on {} table '{}'",
                api,
                self.kind,
                self.name()
            )))
        }
    }

    pub fn key_allocate(&self) -> Result<TableKey<'_>> {
        if !self.kind.capabilities().key {
            return Err(self.unsupported("key allocation"));
        }
        Ok(TableKey::new(self))
    }

    /// Data object for the table's common data fields, all fields active.
    pub fn data_allocate(&self) -> Result<TableData<'_>> {
        self.data_allocate_with_fields(&[])
    }

    /// Data object with only `fields` active; an empty slice activates all.
    pub fn data_allocate_with_fields(&self, fields: &[FieldId]) -> Result<TableData<'_>> {
        if !self.kind.capabilities().data {
            return Err(self.unsupported("data allocation"));
        }
        let mut data = TableData::for_table(self);
        data.reset(None, None, fields)?;
        Ok(data)
    }

    pub fn data_allocate_for_action(&self, action_id: ActionId) -> Result<TableData<'_>> {
        self.data_allocate_for_action_with_fields(action_id, &[])
    }

    pub fn data_allocate_for_action_with_fields(
        &self,
        action_id: ActionId,
        fields: &[FieldId],
    ) -> Result<TableData<'_>> {
        if !self.kind.capabilities().action_data {
            return Err(self.unsupported("action data allocation"));
        }
        let mut data = TableData::for_table(self);
        data.reset(Some(action_id), None, fields)?;
        Ok(data)
    }

    fn unsupported(&self, what: &str) -> TdiError {
        TdiError::not_supported(format!(
            "{what} is not supported on {} table '{}'",
            self.kind,
            self.name()
        ))
    }
}

/// A learn (digest) object in the catalog.
#[derive(Serialize)]
pub struct Learn {
    info: LearnInfo,
    #[serde(skip)]
    backend: Option<Arc<dyn LearnBackend>>,
}

impl Learn {
    pub(crate) fn new(info: LearnInfo) -> Self {
        Self {
            info,
            backend: None,
        }
    }

    pub(crate) fn set_backend(&mut self, backend: Option<Arc<dyn LearnBackend>>) {
        self.backend = backend;
    }

    pub fn info(&self) -> &LearnInfo {
        &self.info
    }

    pub(crate) fn info_mut(&mut self) -> &mut LearnInfo {
        &mut self.info
    }

    pub fn id(&self) -> u32 {
        self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Data object with every learn field active.
    pub fn data_allocate(&self) -> Result<TableData<'_>> {
        let mut data = TableData::for_learn(self);
        data.reset(None, None, &[])?;
        Ok(data)
    }

    /// Deliver this learn's messages to `callback` until deregistered.
    pub fn callback_register(
        &self,
        session: &Session,
        target: &Target,
        callback: LearnCallback,
    ) -> Result<()> {
        let backend = self.backend(session)?;
        backend.callback_register(session.id(), target, self.id(), callback)
    }

    pub fn callback_deregister(&self, session: &Session, target: &Target) -> Result<()> {
        let backend = self.backend(session)?;
        backend.callback_deregister(session.id(), target, self.id())
    }

    /// Release the target resources held by a delivered message.
    pub fn notify_ack(&self, session: &Session, handle: LearnMsgHandle) -> Result<()> {
        let backend = self.backend(session)?;
        backend.notify_ack(session.id(), self.id(), handle)
    }

    fn backend(&self, session: &Session) -> Result<&dyn LearnBackend> {
        let backend = self.backend.as_deref().ok_or_else(|| {
            TdiError::not_supported(format!(
                "learn '{}' has no notification backend",
                self.name()
            ))
        })?;
        if !session.is_valid() {
            return Err(TdiError::invalid_state(format!(
                "session {} has been destroyed",
                session.id()
            )));
        }
        Ok(backend)
    }
}

impl fmt::Debug for Learn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Learn")
            .field("info", &self.info)
            .field("backend", &self.backend.is_some())
            .finish()
    }
}

//! Program catalog: table and learn descriptors, name resolution and the
//! inter-table dependency graph.
//!
//! Descriptors live in [`info`], the table/learn handles and their per-kind
//! capabilities in [`table`], and the indexed [`Catalog`] in [`index`].

pub mod index;
pub mod info;
mod names;
pub mod table;

pub(crate) use index::DependencyRef;
pub use index::Catalog;
pub use info::{
    ActionId, ActionInfo, ActionScope, Annotation, DataFieldInfo, DataType, DefaultValue,
    FieldId, FieldSet, KeyFieldInfo, LearnId, LearnInfo, Named, TableId, TableInfo,
};
pub use table::{Capabilities, Learn, Table, TableApi, TableFactory, TableKind};

//! Schema-driven table metadata catalog and typed key/data codec.
//!
//! A [`DeviceRegistry`] owns [`Device`]s; each device parses its programs'
//! schema documents into an immutable [`Catalog`]. Tables and learns handed
//! out by the catalog allocate [`TableKey`]s and [`TableData`] whose values
//! are checked against the declared field widths and match kinds. Writes are
//! sequenced through a [`Session`]; learn digests reach the embedder through
//! a [`LearnBackend`].

pub mod arch;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod learn;
pub mod mapper;
pub mod registry;
pub mod schema;
pub mod session;
pub mod target;

pub use arch::ArchType;
pub use catalog::{
    ActionInfo, Catalog, DataFieldInfo, DataType, KeyFieldInfo, Learn, LearnInfo, Table,
    TableApi, TableInfo, TableKind,
};
pub use codec::{DataValue, FieldBits, KeyFieldValue, TableData, TableKey};
pub use config::DeviceConfigFile;
pub use device::{DevId, Device, DeviceState, Flags, ProgramConfig, Target, TargetOptions};
pub use error::{Result, Status, TdiError};
pub use learn::{
    LearnBackend, LearnCallback, LearnMessage, LearnMsgHandle, RecordingLearnBackend,
};
pub use mapper::{EnumMapper, MapperExtension, MatchKind, MatchType};
pub use registry::{DeviceRegistry, WarmInit, WarmInitMode, WarmInitOptions};
pub use schema::{SchemaContract, SchemaParser};
pub use session::{RecordingBackend, Session, SessionBackend, SessionState};
pub use target::TargetProfile;

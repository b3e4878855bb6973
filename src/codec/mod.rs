//! Typed key and data values validated against catalog field descriptors.

pub(crate) mod bits;
pub mod data;
pub mod key;

pub use data::{DataParent, DataValue, TableData};
pub use key::{FieldBits, KeyFieldValue, TableKey};

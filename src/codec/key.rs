//! Match key values and the per-table key object.

use crate::catalog::{DataType, FieldId, KeyFieldInfo, Table};
use crate::codec::bits;
use crate::error::{Result, ResultExt, TdiError};
use crate::mapper::MatchKind;
use std::collections::BTreeMap;

/// Raw bits of one key component, either as a scalar or a big-endian array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldBits {
    Scalar(u64),
    Bytes(Vec<u8>),
}

impl FieldBits {
    /// Size in bytes of this representation.
    pub fn size(&self) -> usize {
        match self {
            FieldBits::Scalar(_) => std::mem::size_of::<u64>(),
            FieldBits::Bytes(bytes) => bytes.len(),
        }
    }

    fn zero_like(&self, width: usize) -> FieldBits {
        match self {
            FieldBits::Scalar(_) => FieldBits::Scalar(0),
            FieldBits::Bytes(_) => FieldBits::Bytes(vec![0; bits::byte_len(width)]),
        }
    }

    /// Validate against `info` and return the canonical form.
    fn normalize(&self, info: &KeyFieldInfo) -> Result<FieldBits> {
        match self {
            FieldBits::Scalar(value) => {
                if info.is_ptr() {
                    return Err(TdiError::invalid_argument(format!(
                        "field is {} bits wide and only accepts byte arrays",
                        info.width
                    )));
                }
                bits::check_scalar(*value, info.width)?;
                Ok(FieldBits::Scalar(*value))
            }
            FieldBits::Bytes(bytes) => {
                Ok(FieldBits::Bytes(bits::normalize_bytes(bytes, info.width)?))
            }
        }
    }

    fn to_bytes(&self, width: usize) -> Vec<u8> {
        match self {
            FieldBits::Scalar(value) => bits::scalar_to_bytes(*value, width),
            FieldBits::Bytes(bytes) => bytes.clone(),
        }
    }

    /// Convert `self` into the representation `like` uses.
    fn convert_like(&self, like: &FieldBits, width: usize) -> Result<FieldBits> {
        match like {
            FieldBits::Scalar(_) => match self {
                FieldBits::Scalar(value) => Ok(FieldBits::Scalar(*value)),
                FieldBits::Bytes(bytes) => Ok(FieldBits::Scalar(bits::bytes_to_scalar(bytes)?)),
            },
            FieldBits::Bytes(_) => Ok(FieldBits::Bytes(self.to_bytes(width))),
        }
    }
}

/// One key component. The variant is the match kind it encodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyFieldValue {
    Exact(FieldBits),
    Ternary { value: FieldBits, mask: FieldBits },
    Lpm { value: FieldBits, prefix_len: u16 },
    Range { low: FieldBits, high: FieldBits },
    Optional { value: FieldBits, is_valid: bool },
    /// Exact match on a string-typed field.
    String(String),
}

impl KeyFieldValue {
    pub fn exact(value: u64) -> Self {
        KeyFieldValue::Exact(FieldBits::Scalar(value))
    }

    pub fn exact_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        KeyFieldValue::Exact(FieldBits::Bytes(bytes.into()))
    }

    pub fn ternary(value: u64, mask: u64) -> Self {
        KeyFieldValue::Ternary {
            value: FieldBits::Scalar(value),
            mask: FieldBits::Scalar(mask),
        }
    }

    pub fn ternary_bytes(value: impl Into<Vec<u8>>, mask: impl Into<Vec<u8>>) -> Self {
        KeyFieldValue::Ternary {
            value: FieldBits::Bytes(value.into()),
            mask: FieldBits::Bytes(mask.into()),
        }
    }

    pub fn lpm(value: u64, prefix_len: u16) -> Self {
        KeyFieldValue::Lpm {
            value: FieldBits::Scalar(value),
            prefix_len,
        }
    }

    pub fn lpm_bytes(value: impl Into<Vec<u8>>, prefix_len: u16) -> Self {
        KeyFieldValue::Lpm {
            value: FieldBits::Bytes(value.into()),
            prefix_len,
        }
    }

    pub fn range(low: u64, high: u64) -> Self {
        KeyFieldValue::Range {
            low: FieldBits::Scalar(low),
            high: FieldBits::Scalar(high),
        }
    }

    pub fn range_bytes(low: impl Into<Vec<u8>>, high: impl Into<Vec<u8>>) -> Self {
        KeyFieldValue::Range {
            low: FieldBits::Bytes(low.into()),
            high: FieldBits::Bytes(high.into()),
        }
    }

    pub fn optional(value: u64, is_valid: bool) -> Self {
        KeyFieldValue::Optional {
            value: FieldBits::Scalar(value),
            is_valid,
        }
    }

    pub fn optional_bytes(value: impl Into<Vec<u8>>, is_valid: bool) -> Self {
        KeyFieldValue::Optional {
            value: FieldBits::Bytes(value.into()),
            is_valid,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        KeyFieldValue::String(value.into())
    }

    pub fn match_kind(&self) -> MatchKind {
        match self {
            KeyFieldValue::Exact(_) | KeyFieldValue::String(_) => MatchKind::Exact,
            KeyFieldValue::Ternary { .. } => MatchKind::Ternary,
            KeyFieldValue::Lpm { .. } => MatchKind::Lpm,
            KeyFieldValue::Range { .. } => MatchKind::Range,
            KeyFieldValue::Optional { .. } => MatchKind::Optional,
        }
    }

    /// Byte size of the value representation (string length for strings).
    pub fn size(&self) -> usize {
        match self {
            KeyFieldValue::Exact(value)
            | KeyFieldValue::Ternary { value, .. }
            | KeyFieldValue::Lpm { value, .. }
            | KeyFieldValue::Optional { value, .. } => value.size(),
            KeyFieldValue::Range { low, .. } => low.size(),
            KeyFieldValue::String(text) => text.len(),
        }
    }

    fn normalize(&self, info: &KeyFieldInfo) -> Result<KeyFieldValue> {
        let normalized = match self {
            KeyFieldValue::Exact(value) => KeyFieldValue::Exact(value.normalize(info)?),
            KeyFieldValue::Ternary { value, mask } => KeyFieldValue::Ternary {
                value: value.normalize(info)?,
                mask: mask.normalize(info)?,
            },
            KeyFieldValue::Lpm { value, prefix_len } => {
                if usize::from(*prefix_len) > info.width {
                    return Err(TdiError::invalid_argument(format!(
                        "prefix length {prefix_len} exceeds field width of {} bits",
                        info.width
                    )));
                }
                KeyFieldValue::Lpm {
                    value: value.normalize(info)?,
                    prefix_len: *prefix_len,
                }
            }
            KeyFieldValue::Range { low, high } => {
                let low = low.normalize(info)?;
                let high = high.normalize(info)?;
                if low.to_bytes(info.width) > high.to_bytes(info.width) {
                    return Err(TdiError::invalid_argument(
                        "range low bound is greater than the high bound",
                    ));
                }
                KeyFieldValue::Range { low, high }
            }
            KeyFieldValue::Optional { value, is_valid } => KeyFieldValue::Optional {
                value: value.normalize(info)?,
                is_valid: *is_valid,
            },
            KeyFieldValue::String(text) => {
                if !info.choices.is_empty() && !info.choices.contains(text) {
                    return Err(TdiError::invalid_argument(format!(
                        "'{text}' is not one of {:?}",
                        info.choices
                    )));
                }
                KeyFieldValue::String(text.clone())
            }
        };
        Ok(normalized)
    }

    /// The zero value in the same form as `self`.
    fn zero_like(&self, width: usize) -> KeyFieldValue {
        match self {
            KeyFieldValue::Exact(value) => KeyFieldValue::Exact(value.zero_like(width)),
            KeyFieldValue::Ternary { value, mask } => KeyFieldValue::Ternary {
                value: value.zero_like(width),
                mask: mask.zero_like(width),
            },
            KeyFieldValue::Lpm { value, .. } => KeyFieldValue::Lpm {
                value: value.zero_like(width),
                prefix_len: 0,
            },
            KeyFieldValue::Range { low, high } => KeyFieldValue::Range {
                low: low.zero_like(width),
                high: high.zero_like(width),
            },
            KeyFieldValue::Optional { value, .. } => KeyFieldValue::Optional {
                value: value.zero_like(width),
                is_valid: false,
            },
            KeyFieldValue::String(_) => KeyFieldValue::String(String::new()),
        }
    }

    /// Re-express a stored value in the form `like` was built with.
    fn convert_like(&self, like: &KeyFieldValue, width: usize) -> Result<KeyFieldValue> {
        let converted = match (self, like) {
            (KeyFieldValue::Exact(stored), KeyFieldValue::Exact(want)) => {
                KeyFieldValue::Exact(stored.convert_like(want, width)?)
            }
            (
                KeyFieldValue::Ternary { value, mask },
                KeyFieldValue::Ternary {
                    value: want_value,
                    mask: want_mask,
                },
            ) => KeyFieldValue::Ternary {
                value: value.convert_like(want_value, width)?,
                mask: mask.convert_like(want_mask, width)?,
            },
            (KeyFieldValue::Lpm { value, prefix_len }, KeyFieldValue::Lpm { value: want, .. }) => {
                KeyFieldValue::Lpm {
                    value: value.convert_like(want, width)?,
                    prefix_len: *prefix_len,
                }
            }
            (
                KeyFieldValue::Range { low, high },
                KeyFieldValue::Range {
                    low: want_low,
                    high: want_high,
                },
            ) => KeyFieldValue::Range {
                low: low.convert_like(want_low, width)?,
                high: high.convert_like(want_high, width)?,
            },
            (
                KeyFieldValue::Optional { value, is_valid },
                KeyFieldValue::Optional { value: want, .. },
            ) => KeyFieldValue::Optional {
                value: value.convert_like(want, width)?,
                is_valid: *is_valid,
            },
            (KeyFieldValue::String(text), KeyFieldValue::String(_)) => {
                KeyFieldValue::String(text.clone())
            }
            _ => {
                return Err(TdiError::invalid_argument(format!(
                    "stored {} value cannot be read as {}",
                    self.match_kind(),
                    like.match_kind()
                )));
            }
        };
        Ok(converted)
    }
}

/// Match key for one table. Values are validated against the table's key
/// fields as they are set.
#[derive(Clone, Debug)]
pub struct TableKey<'a> {
    table: &'a Table,
    values: BTreeMap<FieldId, KeyFieldValue>,
}

impl<'a> TableKey<'a> {
    pub(crate) fn new(table: &'a Table) -> Self {
        Self {
            table,
            values: BTreeMap::new(),
        }
    }

    pub fn table(&self) -> &'a Table {
        self.table
    }

    fn field(&self, field_id: FieldId) -> Result<&'a KeyFieldInfo> {
        self.table.info().key_field(field_id)
    }

    fn check_kind(info: &KeyFieldInfo, value: &KeyFieldValue) -> Result<()> {
        if value.match_kind() != info.match_type.kind {
            return Err(TdiError::invalid_argument(format!(
                "match type is {}, value is {}",
                info.match_type.kind,
                value.match_kind()
            )));
        }
        let is_string_field = info.data_type == DataType::String;
        if is_string_field != matches!(value, KeyFieldValue::String(_)) {
            return Err(TdiError::invalid_argument(format!(
                "field type is {} and does not accept this value form",
                info.data_type
            )));
        }
        Ok(())
    }

    pub fn set_value(&mut self, field_id: FieldId, value: KeyFieldValue) -> Result<()> {
        let info = self.field(field_id)?;
        let normalized = Self::check_kind(info, &value)
            .and_then(|()| value.normalize(info))
            .with_context(|| format!("{}: key field '{}'", self.table.name(), info.name))?;
        self.values.insert(field_id, normalized);
        Ok(())
    }

    pub fn set_value_by_name(&mut self, name: &str, value: KeyFieldValue) -> Result<()> {
        let id = self.table.info().key_field_by_name(name)?.id;
        self.set_value(id, value)
    }

    /// Fill `value` with the stored value, in the form `value` was built with.
    /// Fields never set read back as zero.
    pub fn get_value(&self, field_id: FieldId, value: &mut KeyFieldValue) -> Result<()> {
        let info = self.field(field_id)?;
        let read = Self::check_kind(info, value)
            .and_then(|()| match self.values.get(&field_id) {
                Some(stored) => stored.convert_like(value, info.width),
                None => Ok(value.zero_like(info.width)),
            })
            .with_context(|| format!("{}: key field '{}'", self.table.name(), info.name))?;
        *value = read;
        Ok(())
    }

    pub fn get_value_by_name(&self, name: &str, value: &mut KeyFieldValue) -> Result<()> {
        let id = self.table.info().key_field_by_name(name)?.id;
        self.get_value(id, value)
    }

    pub fn is_set(&self, field_id: FieldId) -> bool {
        self.values.contains_key(&field_id)
    }

    /// Mandatory key fields that have no value yet.
    pub fn missing_mandatory(&self) -> Vec<FieldId> {
        self.table
            .info()
            .key_fields
            .iter()
            .filter(|f| f.mandatory && !self.values.contains_key(&f.id))
            .map(|f| f.id)
            .collect()
    }

    pub fn reset(&mut self) {
        self.values.clear();
    }
}

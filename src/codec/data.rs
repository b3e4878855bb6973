//! Data payloads for table entries and learn digests.

use crate::catalog::{ActionId, DataFieldInfo, DataType, DefaultValue, FieldId, Learn, Table};
use crate::codec::bits;
use crate::error::{Result, ResultExt, TdiError};
use std::collections::{BTreeMap, BTreeSet};

/// A typed data field value.
#[derive(Clone, Debug, PartialEq)]
pub enum DataValue {
    U64(u64),
    I64(i64),
    Bytes(Vec<u8>),
    Float(f32),
    Bool(bool),
    Str(String),
    IntArr(Vec<u64>),
    BoolArr(Vec<bool>),
    StrArr(Vec<String>),
}

impl DataValue {
    fn type_name(&self) -> &'static str {
        match self {
            DataValue::U64(_) => "u64",
            DataValue::I64(_) => "i64",
            DataValue::Bytes(_) => "bytes",
            DataValue::Float(_) => "float",
            DataValue::Bool(_) => "bool",
            DataValue::Str(_) => "string",
            DataValue::IntArr(_) => "int array",
            DataValue::BoolArr(_) => "bool array",
            DataValue::StrArr(_) => "string array",
        }
    }

    /// Validate against `info`, returning the value to store.
    fn normalize(self, info: &DataFieldInfo) -> Result<DataValue> {
        let mismatch = |value: &DataValue| {
            TdiError::invalid_argument(format!(
                "{} field does not accept a {} value",
                info.data_type,
                value.type_name()
            ))
        };
        match (info.data_type, self) {
            (DataType::Container, _) => Err(TdiError::not_supported(
                "container fields cannot be set directly",
            )),
            (DataType::Uint64 | DataType::Bytes, DataValue::U64(value)) => {
                if info.is_ptr() {
                    return Err(TdiError::invalid_argument(format!(
                        "field is {} bits wide and only accepts byte arrays",
                        info.width
                    )));
                }
                bits::check_scalar(value, info.width)?;
                Ok(DataValue::U64(value))
            }
            (DataType::Uint64 | DataType::Bytes, DataValue::Bytes(bytes)) => {
                Ok(DataValue::Bytes(bits::normalize_bytes(&bytes, info.width)?))
            }
            (DataType::Int64, DataValue::I64(value)) => {
                bits::check_signed(value, info.width)?;
                Ok(DataValue::I64(value))
            }
            (DataType::Float, value @ DataValue::Float(_))
            | (DataType::Bool, value @ DataValue::Bool(_))
            | (DataType::BoolArr, value @ DataValue::BoolArr(_)) => Ok(value),
            (DataType::String, DataValue::Str(text)) => {
                check_choice(info, &text)?;
                Ok(DataValue::Str(text))
            }
            (DataType::IntArr, DataValue::IntArr(values)) => {
                for value in &values {
                    bits::check_scalar(*value, info.width)?;
                }
                Ok(DataValue::IntArr(values))
            }
            (DataType::StringArr, DataValue::StrArr(values)) => {
                for text in &values {
                    check_choice(info, text)?;
                }
                Ok(DataValue::StrArr(values))
            }
            (_, value) => Err(mismatch(&value)),
        }
    }
}

fn check_choice(info: &DataFieldInfo, text: &str) -> Result<()> {
    if info.choices.is_empty() || info.choices.iter().any(|c| c == text) {
        Ok(())
    } else {
        Err(TdiError::invalid_argument(format!(
            "'{text}' is not one of {:?}",
            info.choices
        )))
    }
}

/// The value an unset field reads back as.
fn default_value(info: &DataFieldInfo) -> Result<DataValue> {
    let value = match (info.data_type, &info.default_value) {
        (DataType::Container, _) => {
            return Err(TdiError::not_supported(
                "container fields have no scalar value",
            ));
        }
        (DataType::Bytes, DefaultValue::Uint(v)) => {
            DataValue::Bytes(bits::scalar_to_bytes(*v, info.width))
        }
        (DataType::Bytes, _) => DataValue::Bytes(vec![0; info.byte_len()]),
        (DataType::Uint64, DefaultValue::Uint(v)) => DataValue::U64(*v),
        (DataType::Uint64, _) => DataValue::U64(0),
        (DataType::Int64, DefaultValue::Int(v)) => DataValue::I64(*v),
        (DataType::Int64, _) => DataValue::I64(0),
        (DataType::Float, DefaultValue::Float(v)) => DataValue::Float(*v),
        (DataType::Float, _) => DataValue::Float(0.0),
        (DataType::Bool, DefaultValue::Bool(v)) => DataValue::Bool(*v),
        (DataType::Bool, _) => DataValue::Bool(false),
        (DataType::String, DefaultValue::Str(v)) => DataValue::Str(v.clone()),
        (DataType::String, _) => DataValue::Str(String::new()),
        (DataType::IntArr, _) => DataValue::IntArr(Vec::new()),
        (DataType::BoolArr, _) => DataValue::BoolArr(Vec::new()),
        (DataType::StringArr, _) => DataValue::StrArr(Vec::new()),
    };
    Ok(value)
}

/// What a [`TableData`] describes the payload of.
#[derive(Clone, Copy, Debug)]
pub enum DataParent<'a> {
    Table(&'a Table),
    Learn(&'a Learn),
}

impl DataParent<'_> {
    fn name(&self) -> &str {
        match self {
            DataParent::Table(table) => table.name(),
            DataParent::Learn(learn) => learn.name(),
        }
    }
}

/// Payload of one table entry or learn digest.
///
/// Tracks which fields are active. After `reset` with an empty list every
/// field is active; fields can then be switched off individually, and setting
/// a `oneof` member switches off its siblings.
#[derive(Clone, Debug)]
pub struct TableData<'a> {
    parent: DataParent<'a>,
    action_id: Option<ActionId>,
    container_id: Option<FieldId>,
    all_active: bool,
    active: BTreeSet<FieldId>,
    removed: BTreeSet<FieldId>,
    values: BTreeMap<FieldId, DataValue>,
}

impl<'a> TableData<'a> {
    pub(crate) fn for_table(table: &'a Table) -> Self {
        Self::with_parent(DataParent::Table(table))
    }

    pub(crate) fn for_learn(learn: &'a Learn) -> Self {
        Self::with_parent(DataParent::Learn(learn))
    }

    fn with_parent(parent: DataParent<'a>) -> Self {
        Self {
            parent,
            action_id: None,
            container_id: None,
            all_active: true,
            active: BTreeSet::new(),
            removed: BTreeSet::new(),
            values: BTreeMap::new(),
        }
    }

    pub fn parent(&self) -> DataParent<'a> {
        self.parent
    }

    pub fn parent_table(&self) -> Result<&'a Table> {
        match self.parent {
            DataParent::Table(table) => Ok(table),
            DataParent::Learn(learn) => Err(TdiError::not_supported(format!(
                "data of learn '{}' has no parent table",
                learn.name()
            ))),
        }
    }

    pub fn parent_learn(&self) -> Result<&'a Learn> {
        match self.parent {
            DataParent::Learn(learn) => Ok(learn),
            DataParent::Table(table) => Err(TdiError::not_supported(format!(
                "data of table '{}' has no parent learn",
                table.name()
            ))),
        }
    }

    pub fn action_id(&self) -> Option<ActionId> {
        self.action_id
    }

    pub fn container_id(&self) -> Option<FieldId> {
        self.container_id
    }

    fn field(&self, field_id: FieldId) -> Result<&'a DataFieldInfo> {
        match self.parent {
            DataParent::Table(table) => table.info().data_field(field_id, self.action_id),
            DataParent::Learn(learn) => learn.info().field(field_id),
        }
    }

    fn field_by_name(&self, name: &str) -> Result<&'a DataFieldInfo> {
        match self.parent {
            DataParent::Table(table) => table.info().data_field_by_name(name, self.action_id),
            DataParent::Learn(learn) => learn.info().field_by_name(name),
        }
    }

    /// Every field id valid for the current action.
    pub fn field_ids(&self) -> Result<Vec<FieldId>> {
        match self.parent {
            DataParent::Table(table) => table.info().data_field_ids(self.action_id),
            DataParent::Learn(learn) => Ok(learn.info().field_ids()),
        }
    }

    /// Clear all values and select the action and active fields.
    ///
    /// An empty `fields` slice makes every field active.
    pub fn reset(
        &mut self,
        action_id: Option<ActionId>,
        container_id: Option<FieldId>,
        fields: &[FieldId],
    ) -> Result<()> {
        if let (Some(id), DataParent::Table(table)) = (action_id, self.parent) {
            table.info().action(id)?;
        }
        if action_id.is_some() && matches!(self.parent, DataParent::Learn(_)) {
            return Err(TdiError::not_supported("learn data has no actions"));
        }
        let previous = self.action_id;
        self.action_id = action_id;
        if let Err(err) = fields.iter().try_for_each(|id| self.field(*id).map(|_| ())) {
            self.action_id = previous;
            return Err(err);
        }
        self.container_id = container_id;
        self.all_active = fields.is_empty();
        self.active = fields.iter().copied().collect();
        self.removed.clear();
        self.values.clear();
        Ok(())
    }

    pub fn is_active(&self, field_id: FieldId) -> bool {
        if self.removed.contains(&field_id) {
            return false;
        }
        if self.all_active {
            return true;
        }
        self.active.contains(&field_id)
    }

    /// Mark a field inactive, dropping any value it holds.
    pub fn remove_active_field(&mut self, field_id: FieldId) -> Result<()> {
        self.field(field_id)?;
        self.removed.insert(field_id);
        self.values.remove(&field_id);
        Ok(())
    }

    /// Active field ids, ascending.
    pub fn active_fields(&self) -> Result<Vec<FieldId>> {
        Ok(self
            .field_ids()?
            .into_iter()
            .filter(|id| self.is_active(*id))
            .collect())
    }

    pub fn set_value(&mut self, field_id: FieldId, value: DataValue) -> Result<()> {
        let info = self.field(field_id)?;
        let normalized = self
            .check_writable(info)
            .and_then(|()| value.normalize(info))
            .with_context(|| format!("{}: data field '{}'", self.parent.name(), info.name))?;
        for sibling in &info.oneof_siblings {
            self.removed.insert(*sibling);
            self.values.remove(sibling);
        }
        self.values.insert(field_id, normalized);
        Ok(())
    }

    pub fn set_value_by_name(&mut self, name: &str, value: DataValue) -> Result<()> {
        let id = self.field_by_name(name)?.id;
        self.set_value(id, value)
    }

    fn check_writable(&self, info: &DataFieldInfo) -> Result<()> {
        if !self.is_active(info.id) {
            return Err(TdiError::invalid_argument("field is not active"));
        }
        if info.read_only {
            return Err(TdiError::invalid_argument("field is read-only"));
        }
        Ok(())
    }

    /// Stored value, or the field's typed default if it was never set.
    pub fn get_value(&self, field_id: FieldId) -> Result<DataValue> {
        let info = self.field(field_id)?;
        if !self.is_active(field_id) {
            return Err(TdiError::invalid_argument(format!(
                "{}: data field '{}' is not active",
                self.parent.name(),
                info.name
            )));
        }
        match self.values.get(&field_id) {
            Some(value) => Ok(value.clone()),
            None => default_value(info)
                .with_context(|| format!("{}: data field '{}'", self.parent.name(), info.name)),
        }
    }

    pub fn get_value_by_name(&self, name: &str) -> Result<DataValue> {
        let id = self.field_by_name(name)?.id;
        self.get_value(id)
    }

    /// Integer view of an integer or byte field.
    pub fn get_u64(&self, field_id: FieldId) -> Result<u64> {
        match self.get_value(field_id)? {
            DataValue::U64(value) => Ok(value),
            DataValue::Bytes(bytes) => bits::bytes_to_scalar(&bytes),
            other => Err(TdiError::invalid_argument(format!(
                "field {field_id} holds a {} value",
                other.type_name()
            ))),
        }
    }

    /// Byte view of an integer or byte field, `ceil(width / 8)` bytes long.
    pub fn get_bytes(&self, field_id: FieldId) -> Result<Vec<u8>> {
        let width = self.field(field_id)?.width;
        match self.get_value(field_id)? {
            DataValue::Bytes(bytes) => Ok(bytes),
            DataValue::U64(value) => Ok(bits::scalar_to_bytes(value, width)),
            other => Err(TdiError::invalid_argument(format!(
                "field {field_id} holds a {} value",
                other.type_name()
            ))),
        }
    }

    pub fn is_set(&self, field_id: FieldId) -> bool {
        self.values.contains_key(&field_id)
    }

    /// Active mandatory fields without a value.
    pub fn missing_mandatory(&self) -> Result<Vec<FieldId>> {
        let mut missing = Vec::new();
        for id in self.active_fields()? {
            if self.field(id)?.mandatory && !self.values.contains_key(&id) {
                missing.push(id);
            }
        }
        Ok(missing)
    }
}

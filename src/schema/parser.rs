//! Schema documents to catalog.
//!
//! Parsing is all-or-nothing: the first fatal problem discards everything
//! built so far and comes back with the file, table and field that caused it.

use crate::catalog::{
    ActionId, ActionInfo, ActionScope, Annotation, Catalog, DataFieldInfo, DataType,
    DefaultValue, DependencyRef, FieldSet, KeyFieldInfo, Learn, LearnInfo, Table, TableFactory,
    TableInfo,
};
use crate::codec::bits;
use crate::error::{Result, ResultExt, TdiError};
use crate::mapper::EnumMapper;
use crate::schema::contract::SchemaContract;
use crate::schema::raw::{
    RawAction, RawAnnotation, RawDataEntry, RawDataField, RawDependency, RawKeyField, RawLearn,
    RawTable, RawType,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

// Only one document layout exists today; the env var lets a deployment accept
// documents stamped by newer generators without a rebuild.
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0.0";
pub const ENV_ALLOWED_SCHEMA_VERSIONS: &str = "TDI_ALLOWED_SCHEMA_VERSIONS";

/// Default version plus any listed in `TDI_ALLOWED_SCHEMA_VERSIONS`.
pub fn allowed_schema_versions() -> BTreeSet<String> {
    let mut versions: BTreeSet<String> = BTreeSet::new();
    versions.insert(DEFAULT_SCHEMA_VERSION.to_string());
    if let Ok(raw) = std::env::var(ENV_ALLOWED_SCHEMA_VERSIONS) {
        for v in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            versions.insert(v.to_string());
        }
    }
    versions
}

#[derive(Default)]
struct Parsed {
    tables: Vec<(TableInfo, Vec<DependencyRef>)>,
    learns: Vec<LearnInfo>,
    optimized_out: BTreeSet<String>,
}

pub struct SchemaParser<'a> {
    mapper: &'a EnumMapper,
    factory: &'a dyn TableFactory,
    contract: Option<&'a SchemaContract>,
    allowed_versions: BTreeSet<String>,
}

impl<'a> SchemaParser<'a> {
    pub fn new(mapper: &'a EnumMapper, factory: &'a dyn TableFactory) -> Self {
        Self {
            mapper,
            factory,
            contract: None,
            allowed_versions: allowed_schema_versions(),
        }
    }

    /// Validate every document against `contract` before parsing it.
    pub fn with_contract(mut self, contract: &'a SchemaContract) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn with_allowed_versions(mut self, versions: BTreeSet<String>) -> Self {
        self.allowed_versions = versions;
        self
    }

    /// Parse every file of one program into a single catalog.
    pub fn parse_files<P: AsRef<Path>>(&self, program: &str, paths: &[P]) -> Result<Catalog> {
        if paths.is_empty() {
            return Err(TdiError::not_found(format!(
                "program '{program}' lists no schema files"
            )));
        }
        let mut parsed = Parsed::default();
        for path in paths {
            let path = path.as_ref();
            debug!(program, path = %path.display(), "parsing schema file");
            let document = read_document(path)?;
            self.parse_document(&document, &mut parsed)
                .with_context(|| path.display().to_string())?;
        }
        self.finish(program, parsed)
    }

    /// Parse already-loaded documents into a single catalog.
    pub fn parse_documents(&self, program: &str, documents: &[Value]) -> Result<Catalog> {
        let mut parsed = Parsed::default();
        for (index, document) in documents.iter().enumerate() {
            self.parse_document(document, &mut parsed)
                .with_context(|| format!("document {index}"))?;
        }
        self.finish(program, parsed)
    }

    fn finish(&self, program: &str, parsed: Parsed) -> Result<Catalog> {
        let mut tables = Vec::with_capacity(parsed.tables.len());
        for (info, deps) in parsed.tables {
            let kind = self.factory.table_kind(info.table_type).ok_or_else(|| {
                TdiError::not_supported(format!(
                    "table '{}': table type {} has no implementation on this target",
                    info.name,
                    self.mapper
                        .table_type_name(info.table_type)
                        .unwrap_or("<unnamed>")
                ))
            })?;
            tables.push((Table::new(info, kind), deps));
        }
        let learns = parsed.learns.into_iter().map(Learn::new).collect();
        Catalog::assemble(program, tables, learns, parsed.optimized_out)
            .with_context(|| format!("program '{program}'"))
    }

    fn parse_document(&self, document: &Value, parsed: &mut Parsed) -> Result<()> {
        let root = document
            .as_object()
            .ok_or_else(|| TdiError::invalid_argument("schema document must be a JSON object"))?;
        self.check_version(root.get("schema_version"))?;
        if let Some(contract) = self.contract {
            contract.validate(document)?;
        }

        for table in array_field(root.get("tables"), "tables")? {
            let name = entity_name(table);
            let entry = RawTable::deserialize(table)
                .map_err(|err| TdiError::invalid_argument(err.to_string()))
                .and_then(|raw| self.build_table(raw))
                .with_context(|| format!("table '{name}'"))?;
            parsed.tables.push(entry);
        }

        let learns = root.get("learn_filters").or_else(|| root.get("learns"));
        for learn in array_field(learns, "learn_filters")? {
            let name = entity_name(learn);
            let info = RawLearn::deserialize(learn)
                .map_err(|err| TdiError::invalid_argument(err.to_string()))
                .and_then(|raw| self.build_learn(raw))
                .with_context(|| format!("learn '{name}'"))?;
            parsed.learns.push(info);
        }

        for name in array_field(root.get("optimized_out_tables"), "optimized_out_tables")? {
            let name = name.as_str().ok_or_else(|| {
                TdiError::invalid_argument("optimized_out_tables entries must be strings")
            })?;
            parsed.optimized_out.insert(name.to_string());
        }
        Ok(())
    }

    fn check_version(&self, version: Option<&Value>) -> Result<()> {
        let Some(version) = version else {
            return Ok(());
        };
        let version = version
            .as_str()
            .ok_or_else(|| TdiError::invalid_argument("schema_version must be a string"))?;
        if !self.allowed_versions.contains(version) {
            return Err(TdiError::invalid_argument(format!(
                "schema_version '{version}' not in allowed set {:?}",
                self.allowed_versions
            )));
        }
        Ok(())
    }

    fn build_table(&self, raw: RawTable) -> Result<(TableInfo, Vec<DependencyRef>)> {
        let table_type = self.mapper.table_type(&raw.table_type)?;
        debug!(
            table = %raw.name,
            table_type = %raw.table_type,
            id = raw.id,
            size = raw.size,
            "parsing table"
        );

        let mut key_fields = FieldSet::default();
        for key in &raw.key {
            let field = self
                .build_key_field(key)
                .with_context(|| format!("key field '{}'", key.name))?;
            key_fields.push(field)?;
        }

        let mut common_data = FieldSet::default();
        for entry in &raw.data {
            for field in build_data_entry(entry, None)? {
                common_data.push(field)?;
            }
        }

        let mut actions = FieldSet::default();
        for action in &raw.action_specs {
            let info = build_action(action, &common_data)
                .with_context(|| format!("action '{}'", action.name))?;
            actions.push(info)?;
        }

        let mut operations = BTreeSet::new();
        for name in &raw.supported_operations {
            match self.mapper.operations_type(name) {
                Some(op) => {
                    operations.insert(op);
                }
                None => warn!(table = %raw.name, operation = %name, "skipping unknown operation"),
            }
        }
        let mut attributes = BTreeSet::new();
        for name in &raw.attributes {
            match self.mapper.attributes_type(name) {
                Some(attr) => {
                    attributes.insert(attr);
                }
                None => warn!(table = %raw.name, attribute = %name, "skipping unknown attribute"),
            }
        }

        let deps = raw
            .depends_on
            .into_iter()
            .map(|dep| match dep {
                RawDependency::Id(id) => DependencyRef::Id(id),
                RawDependency::Name(name) => DependencyRef::Name(name),
            })
            .collect();

        let info = TableInfo {
            id: raw.id,
            name: raw.name,
            table_type,
            size: raw.size,
            has_const_default_action: raw.has_const_default_action,
            is_const: raw.is_const,
            key_fields,
            common_data,
            actions,
            depends_on: BTreeSet::new(),
            dependents: BTreeSet::new(),
            operations,
            attributes,
            annotations: annotations(&raw.annotations),
            aliases: BTreeSet::new(),
        };
        Ok((info, deps))
    }

    fn build_key_field(&self, raw: &RawKeyField) -> Result<KeyFieldInfo> {
        let match_type = self.mapper.match_type(&raw.match_type)?;
        let (data_type, width) = resolve_type(&raw.field_type, raw.repeated)?;
        let default_value = parse_default(
            data_type,
            width,
            raw.field_type.default_value.as_ref(),
            &raw.field_type.choices,
        )?;
        let annotations = annotations(&raw.annotations);
        let is_field_slice = annotations
            .iter()
            .any(|a| a.name == "isFieldSlice" && a.value == "true");
        Ok(KeyFieldInfo {
            id: raw.id,
            name: raw.name.clone(),
            match_type,
            data_type,
            width,
            mandatory: raw.mandatory,
            repeated: raw.repeated,
            choices: raw.field_type.choices.clone(),
            default_value,
            annotations,
            is_field_slice,
        })
    }

    fn build_learn(&self, raw: RawLearn) -> Result<LearnInfo> {
        let mut fields = FieldSet::default();
        for entry in &raw.fields {
            for field in build_data_entry(entry, None)? {
                fields.push(field)?;
            }
        }
        debug!(learn = %raw.name, id = raw.id, fields = fields.len(), "parsed learn");
        Ok(LearnInfo {
            id: raw.id,
            name: raw.name,
            fields,
            annotations: annotations(&raw.annotations),
            aliases: BTreeSet::new(),
        })
    }
}

fn read_document(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .map_err(|err| TdiError::io(format!("reading {}: {err}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|err| TdiError::io(format!("parsing {}: {err}", path.display())))
}

fn array_field<'v>(value: Option<&'v Value>, key: &str) -> Result<&'v [Value]> {
    match value {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(TdiError::invalid_argument(format!(
            "'{key}' must be an array"
        ))),
    }
}

fn entity_name(value: &Value) -> &str {
    value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
}

fn annotations(raw: &[RawAnnotation]) -> BTreeSet<Annotation> {
    raw.iter()
        .map(|a| Annotation::new(a.name.clone(), a.value.clone()))
        .collect()
}

fn build_action(raw: &RawAction, common: &FieldSet<DataFieldInfo>) -> Result<ActionInfo> {
    let scope = match raw.action_scope.as_deref() {
        None => ActionScope::TableAndDefault,
        Some(value) => ActionScope::from_schema(value).ok_or_else(|| {
            TdiError::invalid_argument(format!("unknown action_scope '{value}'"))
        })?,
    };
    let mut data_fields = FieldSet::default();
    for entry in &raw.data {
        for field in build_data_entry(entry, Some(raw.id))? {
            if common.contains(field.id) {
                return Err(TdiError::already_exists(format!(
                    "data field id {} ('{}') collides with a common data field",
                    field.id, field.name
                )));
            }
            data_fields.push(field)?;
        }
    }
    Ok(ActionInfo {
        id: raw.id,
        name: raw.name.clone(),
        scope,
        annotations: annotations(&raw.annotations),
        data_fields,
    })
}

fn build_data_entry(entry: &RawDataEntry, action_id: Option<ActionId>) -> Result<Vec<DataFieldInfo>> {
    match entry {
        RawDataEntry::Field(field) => Ok(vec![build_data_field(
            field,
            field.mandatory,
            field.read_only,
            BTreeSet::new(),
            action_id,
        )?]),
        RawDataEntry::Singleton {
            mandatory,
            read_only,
            singleton,
        } => Ok(vec![build_data_field(
            singleton,
            *mandatory || singleton.mandatory,
            *read_only || singleton.read_only,
            BTreeSet::new(),
            action_id,
        )?]),
        RawDataEntry::OneOf {
            mandatory,
            read_only,
            oneof,
        } => {
            let group: BTreeSet<u32> = oneof.iter().map(|f| f.id).collect();
            oneof
                .iter()
                .map(|member| {
                    let mut siblings = group.clone();
                    siblings.remove(&member.id);
                    build_data_field(
                        member,
                        *mandatory || member.mandatory,
                        *read_only || member.read_only,
                        siblings,
                        action_id,
                    )
                })
                .collect()
        }
    }
}

fn build_data_field(
    raw: &RawDataField,
    mandatory: bool,
    read_only: bool,
    oneof_siblings: BTreeSet<u32>,
    action_id: Option<ActionId>,
) -> Result<DataFieldInfo> {
    let build = || -> Result<DataFieldInfo> {
        let (data_type, width, default_value, choices) = match (&raw.container, &raw.field_type) {
            (Some(_), _) => (DataType::Container, 0, DefaultValue::Empty, Vec::new()),
            (None, Some(ty)) => {
                let (data_type, width) = resolve_type(ty, raw.repeated)?;
                let default_value =
                    parse_default(data_type, width, ty.default_value.as_ref(), &ty.choices)?;
                (data_type, width, default_value, ty.choices.clone())
            }
            (None, None) => {
                return Err(TdiError::invalid_argument(
                    "field has neither 'type' nor 'container'",
                ));
            }
        };
        Ok(DataFieldInfo {
            id: raw.id,
            name: raw.name.clone(),
            data_type,
            width,
            default_value,
            mandatory,
            read_only,
            repeated: raw.repeated,
            choices,
            annotations: annotations(&raw.annotations),
            oneof_siblings,
            action_id,
        })
    };
    build().with_context(|| format!("data field '{}'", raw.name))
}

fn resolve_type(ty: &RawType, repeated: bool) -> Result<(DataType, usize)> {
    let (data_type, fixed_width) = DataType::from_schema(&ty.type_name, repeated)
        .ok_or_else(|| TdiError::invalid_argument(format!("unknown type '{}'", ty.type_name)))?;
    let width = match data_type {
        DataType::Bytes => {
            let width = ty
                .width
                .ok_or_else(|| TdiError::invalid_argument("bytes type requires a width"))?;
            if width == 0 {
                return Err(TdiError::invalid_argument("width must be at least 1 bit"));
            }
            width
        }
        DataType::String | DataType::StringArr => ty.width.unwrap_or(0),
        _ => fixed_width,
    };
    Ok((data_type, width))
}

fn parse_default(
    data_type: DataType,
    width: usize,
    raw: Option<&Value>,
    choices: &[String],
) -> Result<DefaultValue> {
    let Some(raw) = raw.filter(|v| !v.is_null()) else {
        return Ok(zero_default(data_type));
    };
    let mismatch = || {
        TdiError::invalid_argument(format!(
            "default value {raw} does not match type {data_type}"
        ))
    };
    let value = match data_type {
        DataType::Uint64 | DataType::Bytes => {
            let value = raw.as_u64().ok_or_else(mismatch)?;
            bits::check_scalar(value, width)?;
            DefaultValue::Uint(value)
        }
        DataType::Int64 => {
            let value = raw.as_i64().ok_or_else(mismatch)?;
            bits::check_signed(value, width)?;
            DefaultValue::Int(value)
        }
        DataType::Float => DefaultValue::Float(raw.as_f64().ok_or_else(mismatch)? as f32),
        DataType::Bool => match raw {
            Value::Bool(b) => DefaultValue::Bool(*b),
            Value::Number(n) if n.as_u64() == Some(0) => DefaultValue::Bool(false),
            Value::Number(n) if n.as_u64() == Some(1) => DefaultValue::Bool(true),
            _ => return Err(mismatch()),
        },
        DataType::String => {
            let text = raw.as_str().ok_or_else(mismatch)?;
            if !choices.is_empty() && !choices.iter().any(|c| c == text) {
                return Err(TdiError::invalid_argument(format!(
                    "default value '{text}' is not one of {choices:?}"
                )));
            }
            DefaultValue::Str(text.to_string())
        }
        DataType::IntArr | DataType::BoolArr | DataType::StringArr | DataType::Container => {
            return Err(TdiError::invalid_argument(format!(
                "{data_type} fields take no default value"
            )));
        }
    };
    Ok(value)
}

fn zero_default(data_type: DataType) -> DefaultValue {
    match data_type {
        DataType::Uint64 | DataType::Bytes => DefaultValue::Uint(0),
        DataType::Int64 => DefaultValue::Int(0),
        DataType::Float => DefaultValue::Float(0.0),
        DataType::Bool => DefaultValue::Bool(false),
        DataType::String => DefaultValue::Str(String::new()),
        DataType::IntArr | DataType::BoolArr | DataType::StringArr | DataType::Container => {
            DefaultValue::Empty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;
    use crate::target::TargetProfile;
    use serde_json::json;

    fn parse(doc: Value) -> Result<Catalog> {
        let profile = TargetProfile::dummy();
        let mut builder = EnumMapper::builder();
        builder.extend(profile.extension())?;
        let mapper = builder.build();
        SchemaParser::new(&mapper, &profile)
            .with_allowed_versions(BTreeSet::from([DEFAULT_SCHEMA_VERSION.to_string()]))
            .parse_documents("prog", &[doc])
    }

    fn table(name: &str, id: u32, data: Value) -> Value {
        json!({
            "name": name, "id": id, "table_type": "MatchAction_Direct", "size": 16,
            "key": [], "data": data, "action_specs": []
        })
    }

    #[test]
    fn default_wider_than_field_is_fatal() {
        let doc = json!({ "tables": [ table("t", 1, json!([
            { "id": 1, "name": "f", "type": { "type": "bytes", "width": 4, "default_value": 16 } }
        ])) ] });
        let err = parse(doc).unwrap_err();
        assert_eq!(err.status(), Status::InvalidArgument);
        assert!(err.message().contains("table 't'"), "{}", err.message());
        assert!(err.message().contains("data field 'f'"), "{}", err.message());
    }

    #[test]
    fn zero_width_fields_are_rejected() {
        let mut keyed = table("t", 1, json!([]));
        keyed["key"] = json!([
            { "id": 1, "name": "k", "match_type": "Exact", "type": { "type": "bytes", "width": 0 } }
        ]);
        let err = parse(json!({ "tables": [keyed] })).unwrap_err();
        assert_eq!(err.status(), Status::InvalidArgument);
        assert!(err.message().contains("key field 'k'"), "{}", err.message());
        assert!(err.message().contains("at least 1 bit"), "{}", err.message());

        let doc = json!({ "tables": [ table("t", 1, json!([
            { "id": 1, "name": "f", "type": { "type": "bytes", "width": 0 } }
        ])) ] });
        let err = parse(doc).unwrap_err();
        assert_eq!(err.status(), Status::InvalidArgument);
        assert!(err.message().contains("data field 'f'"), "{}", err.message());
    }

    #[test]
    fn malformed_data_entry_names_field_and_missing_key() {
        let doc = json!({ "tables": [ table("t", 1, json!([
            { "name": "f", "type": { "type": "bytes", "width": 8 } }
        ])) ] });
        let err = parse(doc).unwrap_err();
        assert_eq!(err.status(), Status::InvalidArgument);
        assert!(err.message().contains("data field 'f'"), "{}", err.message());
        assert!(err.message().contains("missing field `id`"), "{}", err.message());

        let doc = json!({ "tables": [ table("t", 1, json!([
            { "singleton": { "name": "s", "type": { "type": "bool" } } }
        ])) ] });
        let err = parse(doc).unwrap_err();
        assert!(err.message().contains("data field 's'"), "{}", err.message());
        assert!(err.message().contains("missing field `id`"), "{}", err.message());
    }

    #[test]
    fn default_type_mismatch_is_fatal() {
        let doc = json!({ "tables": [ table("t", 1, json!([
            { "id": 1, "name": "f", "type": { "type": "bool", "default_value": "yes" } }
        ])) ] });
        assert_eq!(parse(doc).unwrap_err().status(), Status::InvalidArgument);
    }

    #[test]
    fn oneof_members_know_their_siblings() {
        let doc = json!({ "tables": [ table("t", 1, json!([
            { "mandatory": true, "read_only": false, "oneof": [
                { "id": 10, "name": "a", "type": { "type": "uint32" } },
                { "id": 11, "name": "b", "type": { "type": "uint32" } },
                { "id": 12, "name": "c", "type": { "type": "uint32" } }
            ] },
            { "mandatory": false, "read_only": true, "singleton":
                { "id": 20, "name": "s", "type": { "type": "uint64" } } }
        ])) ] });
        let catalog = parse(doc).unwrap();
        let info = catalog.table_from_id(1).unwrap().info();
        let b = info.data_field(11, None).unwrap();
        assert!(b.mandatory);
        assert_eq!(b.oneof_siblings, BTreeSet::from([10, 12]));
        let s = info.data_field(20, None).unwrap();
        assert!(s.read_only);
        assert!(s.oneof_siblings.is_empty());
    }

    #[test]
    fn unsupported_schema_version_is_rejected() {
        let doc = json!({ "schema_version": "9.9.9", "tables": [] });
        let err = parse(doc).unwrap_err();
        assert_eq!(err.status(), Status::InvalidArgument);
        assert!(err.message().contains("9.9.9"));
    }

    #[test]
    fn unknown_table_type_is_invalid_argument() {
        let doc = json!({ "tables": [ {
            "name": "t", "id": 1, "table_type": "NoSuchType", "size": 1
        } ] });
        assert_eq!(parse(doc).unwrap_err().status(), Status::InvalidArgument);
    }

    #[test]
    fn missing_required_key_names_the_table() {
        let doc = json!({ "tables": [ { "name": "pipe.t", "id": 1, "size": 1 } ] });
        let err = parse(doc).unwrap_err();
        assert_eq!(err.status(), Status::InvalidArgument);
        assert!(err.message().contains("table 'pipe.t'"), "{}", err.message());
    }

    #[test]
    fn repeated_and_string_types_resolve() {
        let doc = json!({ "tables": [ table("t", 1, json!([
            { "id": 1, "name": "ports", "repeated": true, "type": { "type": "uint32" } },
            { "id": 2, "name": "mode", "type": {
                "type": "string", "choices": ["INGRESS", "EGRESS"], "default_value": "EGRESS" } },
            { "id": 3, "name": "nested", "container": [] }
        ])) ] });
        let catalog = parse(doc).unwrap();
        let info = catalog.table_from_id(1).unwrap().info();
        assert_eq!(info.data_field(1, None).unwrap().data_type, DataType::IntArr);
        let mode = info.data_field(2, None).unwrap();
        assert_eq!(mode.default_value, DefaultValue::Str("EGRESS".into()));
        assert!(info.data_field(3, None).unwrap().is_container());
    }

    #[test]
    fn action_field_colliding_with_common_data_is_rejected() {
        let mut t = table("t", 1, json!([
            { "id": 1, "name": "c", "type": { "type": "uint32" } }
        ]));
        t["action_specs"] = json!([ { "id": 5, "name": "act", "data": [
            { "id": 1, "name": "p", "type": { "type": "bytes", "width": 9 } }
        ] } ]);
        let err = parse(json!({ "tables": [t] })).unwrap_err();
        assert_eq!(err.status(), Status::AlreadyExists);
    }
}

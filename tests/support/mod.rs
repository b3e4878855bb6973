#![allow(dead_code)]

// Shared builders for schema documents and the catalogs parsed from them.

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::io::Write;
use std::path::PathBuf;
use tdi_catalog::{
    ArchType, Catalog, Device, EnumMapper, ProgramConfig, SchemaParser, TargetOptions,
    TargetProfile,
};
use tempfile::{NamedTempFile, TempDir};

pub const FORWARD: &str = "pipe.SwitchIngress.forward";
pub const FORWARD_ID: u32 = 37882547;
pub const ACL_ID: u32 = 37882560;
pub const ECMP_ID: u32 = 37882570;
pub const EGRESS_FORWARD_ID: u32 = 37882580;
pub const PORT_COUNTER_ID: u32 = 37882590;
pub const SET_PORT_ID: u32 = 20;
pub const MIRROR_ID: u32 = 31;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Device 0 (TNA, dummy target) with the checked-in fixture loaded as
/// program `switch`.
pub fn fixture_device() -> Result<Device> {
    fixture_device_with(TargetOptions::default())
}

pub fn fixture_device_with(options: TargetOptions) -> Result<Device> {
    let program = ProgramConfig::new("switch", vec![fixture_path("tna_exact_match.json")]);
    Device::new(0, ArchType::Tna, vec![program], options, None)
        .context("loading tna_exact_match.json")
}

pub fn mapper(arch: ArchType) -> tdi_catalog::Result<EnumMapper> {
    let mut builder = EnumMapper::builder();
    builder.extend(&arch.mapper_extension())?;
    builder.extend(TargetProfile::dummy().extension())?;
    Ok(builder.build())
}

/// Parse in-memory documents with the TNA mapping and the dummy target.
pub fn parse(documents: &[Value]) -> tdi_catalog::Result<Catalog> {
    let mapper = mapper(ArchType::Tna)?;
    let profile = TargetProfile::dummy();
    SchemaParser::new(&mapper, &profile).parse_documents("test", documents)
}

pub fn document(tables: Vec<Value>) -> Value {
    json!({ "schema_version": "1.0.0", "tables": tables, "learn_filters": [] })
}

pub fn table(name: &str, id: u32, keys: Vec<Value>) -> Value {
    json!({
        "name": name,
        "id": id,
        "table_type": "MatchAction_Direct",
        "size": 16,
        "key": keys,
        "action_specs": [],
        "data": []
    })
}

pub fn table_depending_on(name: &str, id: u32, depends_on: Vec<Value>) -> Value {
    let mut value = table(name, id, vec![exact_key(1, "k", 8)]);
    value["depends_on"] = Value::Array(depends_on);
    value
}

pub fn exact_key(id: u32, name: &str, width: usize) -> Value {
    key(id, name, "Exact", width)
}

pub fn key(id: u32, name: &str, match_type: &str, width: usize) -> Value {
    json!({
        "id": id,
        "name": name,
        "match_type": match_type,
        "type": { "type": "bytes", "width": width }
    })
}

pub fn bytes_field(id: u32, name: &str, width: usize) -> Value {
    json!({ "id": id, "name": name, "type": { "type": "bytes", "width": width } })
}

pub fn typed_field(id: u32, name: &str, ty: Value) -> Value {
    json!({ "id": id, "name": name, "type": ty })
}

pub fn write_document(document: &Value) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new().context("creating temp schema")?;
    serde_json::to_writer_pretty(&mut file, document)?;
    file.flush()?;
    Ok(file)
}

/// Write `contents` to `name` inside `dir`, returning the full path.
pub fn write_in(dir: &TempDir, name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

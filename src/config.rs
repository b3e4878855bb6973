//! Device configuration file.
//!
//! ```json
//! { "devices": [ { "dev_id": 0, "arch": "tna", "target": "dummy",
//!     "programs": [ { "program_name": "switch",
//!                     "tdi_config": ["switch/tdi.json"],
//!                     "p4_pipelines": [ { "p4_pipeline_name": "pipe",
//!                                         "context": "pipe/context.json",
//!                                         "config": "pipe/tofino.bin",
//!                                         "pipe_scope": [0, 1] } ] } ] } ] }
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use crate::arch::ArchType;
use crate::device::{DevId, P4Pipeline, ProgramConfig, TargetOptions};
use crate::error::{Result, TdiError};
use crate::registry::DeviceRegistry;
use crate::target::TargetProfile;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfigFile {
    pub devices: Vec<DeviceEntry>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    pub dev_id: DevId,
    pub arch: ArchType,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub programs: Vec<ProgramEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramEntry {
    pub program_name: String,
    pub tdi_config: Vec<PathBuf>,
    #[serde(default)]
    pub p4_pipelines: Vec<PipelineEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineEntry {
    pub p4_pipeline_name: String,
    #[serde(default)]
    pub context: Option<PathBuf>,
    #[serde(default)]
    pub config: Option<PathBuf>,
    #[serde(default)]
    pub pipe_scope: Vec<u32>,
}

impl DeviceConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|err| TdiError::io(format!("reading {}: {err}", path.display())))?;
        let mut config: DeviceConfigFile = serde_json::from_str(&text).map_err(|err| {
            TdiError::invalid_argument(format!("parsing {}: {err}", path.display()))
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn device(&self, dev_id: DevId) -> Result<&DeviceEntry> {
        self.devices
            .iter()
            .find(|entry| entry.dev_id == dev_id)
            .ok_or_else(|| TdiError::not_found(format!("device {dev_id} is not configured")))
    }

    /// Program configs of `entry` with every path made absolute.
    pub fn program_configs(&self, entry: &DeviceEntry) -> Vec<ProgramConfig> {
        entry
            .programs
            .iter()
            .map(|program| ProgramConfig {
                name: program.program_name.clone(),
                tdi_info_paths: program
                    .tdi_config
                    .iter()
                    .map(|p| self.resolve(p))
                    .collect(),
                pipelines: program
                    .p4_pipelines
                    .iter()
                    .map(|pipeline| P4Pipeline {
                        name: pipeline.p4_pipeline_name.clone(),
                        context_path: pipeline
                            .context
                            .as_deref()
                            .map(|p| self.resolve(p))
                            .unwrap_or_default(),
                        binary_path: pipeline
                            .config
                            .as_deref()
                            .map(|p| self.resolve(p))
                            .unwrap_or_default(),
                        scope: pipeline.pipe_scope.clone(),
                    })
                    .collect(),
            })
            .collect()
    }

    /// Add every configured device to `registry`, using `options` as the
    /// template for target settings. Stops at the first failure.
    pub fn add_all(&self, registry: &DeviceRegistry, options: &TargetOptions) -> Result<Vec<DevId>> {
        let mut added = Vec::with_capacity(self.devices.len());
        for entry in &self.devices {
            let mut device_options = options.clone();
            if let Some(name) = entry.target.as_deref() {
                device_options.profile = target_profile(name)?;
            }
            registry.device_add(
                entry.dev_id,
                entry.arch,
                self.program_configs(entry),
                device_options,
                None,
            )?;
            added.push(entry.dev_id);
        }
        Ok(added)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Built-in target profile by name.
pub fn target_profile(name: &str) -> Result<TargetProfile> {
    match name {
        "dummy" => Ok(TargetProfile::dummy()),
        other => Err(TdiError::invalid_argument(format!(
            "unknown target '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("devices.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "devices": [ {{ "dev_id": 2, "arch": "tna",
                "programs": [ {{ "program_name": "p",
                    "tdi_config": ["p/tdi.json", "/abs/tdi.json"],
                    "p4_pipelines": [ {{ "p4_pipeline_name": "pipe",
                        "context": "pipe/context.json", "pipe_scope": [0] }} ] }} ] }} ] }}"#
        )
        .unwrap();

        let config = DeviceConfigFile::load(&path).unwrap();
        let entry = config.device(2).unwrap();
        assert_eq!(entry.arch, ArchType::Tna);
        let programs = config.program_configs(entry);
        assert_eq!(programs[0].tdi_info_paths[0], dir.path().join("p/tdi.json"));
        assert_eq!(programs[0].tdi_info_paths[1], PathBuf::from("/abs/tdi.json"));
        assert_eq!(
            programs[0].pipelines[0].context_path,
            dir.path().join("pipe/context.json")
        );
        assert!(programs[0].pipelines[0].binary_path.as_os_str().is_empty());
    }

    #[test]
    fn unknown_target_is_rejected() {
        let err = target_profile("asic").unwrap_err();
        assert_eq!(err.status(), crate::error::Status::InvalidArgument);
    }
}

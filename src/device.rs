//! Devices, their loaded programs, and the target/flags helpers they hand out.

use crate::arch::ArchType;
use crate::catalog::Catalog;
use crate::error::{Result, TdiError};
use crate::learn::LearnBackend;
use crate::mapper::{EnumMapper, MapperExtension};
use crate::schema::{SchemaContract, SchemaParser, allowed_schema_versions};
use crate::session::{Session, SessionBackend};
use crate::target::TargetProfile;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

pub type DevId = u32;

/// Opaque caller data attached to a device.
pub type Cookie = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct P4Pipeline {
    pub name: String,
    #[serde(default)]
    pub context_path: PathBuf,
    #[serde(default)]
    pub binary_path: PathBuf,
    /// Pipes this pipeline is loaded on.
    #[serde(default)]
    pub scope: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub name: String,
    pub tdi_info_paths: Vec<PathBuf>,
    #[serde(default)]
    pub pipelines: Vec<P4Pipeline>,
}

impl ProgramConfig {
    pub fn new(name: impl Into<String>, tdi_info_paths: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            tdi_info_paths,
            pipelines: Vec::new(),
        }
    }
}

/// Target-specific inputs to device construction.
#[derive(Clone)]
pub struct TargetOptions {
    pub profile: TargetProfile,
    /// Applied after the architecture and profile entries.
    pub extra_extensions: Vec<MapperExtension>,
    pub session_backend: Option<Arc<dyn SessionBackend>>,
    pub learn_backend: Option<Arc<dyn LearnBackend>>,
    pub contract: Option<Arc<SchemaContract>>,
    /// Overrides the `TDI_ALLOWED_SCHEMA_VERSIONS` set.
    pub allowed_versions: Option<BTreeSet<String>>,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            profile: TargetProfile::dummy(),
            extra_extensions: Vec::new(),
            session_backend: None,
            learn_backend: None,
            contract: None,
            allowed_versions: None,
        }
    }
}

impl fmt::Debug for TargetOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetOptions")
            .field("profile", &self.profile.name())
            .field("extra_extensions", &self.extra_extensions.len())
            .field("session_backend", &self.session_backend.is_some())
            .field("learn_backend", &self.learn_backend.is_some())
            .field("contract", &self.contract.as_ref().map(|c| c.origin()))
            .field("allowed_versions", &self.allowed_versions)
            .finish()
    }
}

/// Lifecycle of a device with respect to warm init.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DeviceState {
    Cold,
    WarmInitInProgress,
    Active,
}

/// Target attribute selectors. Which ones are accepted depends on the
/// device's architecture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetField {
    DevId,
    PipeId,
    Direction,
}

pub const ALL_PIPES: u64 = 0xffff;
pub const ALL_DIRECTIONS: u64 = 0xff;

/// Device-plus-scope a table operation is addressed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    arch: ArchType,
    dev_id: DevId,
    values: BTreeMap<TargetField, u64>,
}

impl Target {
    fn new(arch: ArchType, dev_id: DevId) -> Self {
        let mut values = BTreeMap::new();
        values.insert(TargetField::PipeId, ALL_PIPES);
        if arch == ArchType::Tna {
            values.insert(TargetField::Direction, ALL_DIRECTIONS);
        }
        Self {
            arch,
            dev_id,
            values,
        }
    }

    pub fn dev_id(&self) -> DevId {
        self.dev_id
    }

    pub fn set_value(&mut self, field: TargetField, value: u64) -> Result<()> {
        match field {
            TargetField::DevId => {
                self.dev_id = DevId::try_from(value).map_err(|_| {
                    TdiError::invalid_argument(format!("device id {value} out of range"))
                })?;
                Ok(())
            }
            _ => {
                let slot = self.values.get_mut(&field).ok_or_else(|| {
                    TdiError::invalid_argument(format!(
                        "{field:?} is not a target attribute of {}",
                        self.arch
                    ))
                })?;
                *slot = value;
                Ok(())
            }
        }
    }

    pub fn get_value(&self, field: TargetField) -> Result<u64> {
        match field {
            TargetField::DevId => Ok(u64::from(self.dev_id)),
            _ => self.values.get(&field).copied().ok_or_else(|| {
                TdiError::invalid_argument(format!(
                    "{field:?} is not a target attribute of {}",
                    self.arch
                ))
            }),
        }
    }
}

/// Bit set of per-call flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags(u64);

impl Flags {
    pub const FROM_HW: u32 = 0;
    pub const MOD_INC: u32 = 1;

    pub fn new(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn set_value(&mut self, flag: u32, value: bool) -> Result<()> {
        let mask = flag_mask(flag)?;
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
        Ok(())
    }

    pub fn get_value(self, flag: u32) -> Result<bool> {
        Ok(self.0 & flag_mask(flag)? != 0)
    }
}

fn flag_mask(flag: u32) -> Result<u64> {
    1u64.checked_shl(flag)
        .ok_or_else(|| TdiError::invalid_argument(format!("flag bit {flag} out of range")))
}

/// A device with one catalog per loaded program.
pub struct Device {
    id: DevId,
    arch: ArchType,
    programs: Vec<ProgramConfig>,
    catalogs: BTreeMap<String, Catalog>,
    mapper: EnumMapper,
    options: TargetOptions,
    cookie: Option<Cookie>,
    state: Mutex<DeviceState>,
    next_session: AtomicU64,
}

impl Device {
    /// Build the enum mapping for `arch` and the target, then parse every
    /// program's schema files. Any failure leaves nothing behind.
    pub fn new(
        id: DevId,
        arch: ArchType,
        programs: Vec<ProgramConfig>,
        options: TargetOptions,
        cookie: Option<Cookie>,
    ) -> Result<Self> {
        let mut builder = EnumMapper::builder();
        builder.extend(&arch.mapper_extension())?;
        builder.extend(options.profile.extension())?;
        for extension in &options.extra_extensions {
            builder.extend(extension)?;
        }
        let mapper = builder.build();

        let mut catalogs = BTreeMap::new();
        for program in &programs {
            if catalogs.contains_key(&program.name) {
                return Err(TdiError::already_exists(format!(
                    "program '{}' is configured twice on device {id}",
                    program.name
                )));
            }
            let mut parser = SchemaParser::new(&mapper, &options.profile).with_allowed_versions(
                options
                    .allowed_versions
                    .clone()
                    .unwrap_or_else(allowed_schema_versions),
            );
            if let Some(contract) = options.contract.as_deref() {
                parser = parser.with_contract(contract);
            }
            let mut catalog = parser
                .parse_files(&program.name, &program.tdi_info_paths)
                .map_err(|err| err.context(format!("device {id}")))?;
            catalog.set_learn_backend(options.learn_backend.clone());
            info!(
                dev_id = id,
                program = %program.name,
                tables = catalog.tables().len(),
                "program loaded"
            );
            catalogs.insert(program.name.clone(), catalog);
        }

        Ok(Self {
            id,
            arch,
            programs,
            catalogs,
            mapper,
            options,
            cookie,
            state: Mutex::new(DeviceState::Cold),
            next_session: AtomicU64::new(1),
        })
    }

    pub fn id(&self) -> DevId {
        self.id
    }

    pub fn arch(&self) -> ArchType {
        self.arch
    }

    pub fn mapper(&self) -> &EnumMapper {
        &self.mapper
    }

    pub fn program_configs(&self) -> &[ProgramConfig] {
        &self.programs
    }

    pub fn program_names(&self) -> Vec<&str> {
        self.catalogs.keys().map(String::as_str).collect()
    }

    /// Catalog of a loaded program.
    pub fn tdi_info(&self, program: &str) -> Result<&Catalog> {
        self.catalogs.get(program).ok_or_else(|| {
            TdiError::not_found(format!(
                "program '{program}' is not loaded on device {}",
                self.id
            ))
        })
    }

    pub fn cookie(&self) -> Option<&Cookie> {
        self.cookie.as_ref()
    }

    pub fn target_options(&self) -> &TargetOptions {
        &self.options
    }

    pub fn state(&self) -> DeviceState {
        *self.state.lock()
    }

    /// Move to `to` when `check` accepts the current state and `step`
    /// succeeds. The state lock is held throughout, so concurrent transitions
    /// on one device are serialized and only one can leave a given state.
    pub(crate) fn transition(
        &self,
        to: DeviceState,
        check: impl FnOnce(DeviceState) -> Result<()>,
        step: impl FnOnce() -> Result<()>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        check(*state)?;
        step()?;
        *state = to;
        Ok(())
    }

    /// A target addressing every pipe (and direction, where applicable).
    pub fn create_target(&self) -> Target {
        Target::new(self.arch, self.id)
    }

    pub fn create_flags(&self, bits: u64) -> Flags {
        Flags::new(bits)
    }

    /// Open a session on the target's backend.
    pub fn create_session(&self) -> Result<Session> {
        let backend = self.options.session_backend.clone().ok_or_else(|| {
            TdiError::not_supported(format!(
                "target '{}' on device {} provides no session backend",
                self.options.profile.name(),
                self.id
            ))
        })?;
        let session_id = self.next_session.fetch_add(1, Ordering::Relaxed);
        debug!(dev_id = self.id, session_id, "session created");
        Ok(Session::new(session_id, backend))
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("arch", &self.arch)
            .field("programs", &self.program_names())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

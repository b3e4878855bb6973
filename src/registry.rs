//! Process-wide set of devices, constructed explicitly by the embedder.

use crate::arch::ArchType;
use crate::device::{Cookie, DevId, Device, DeviceState, ProgramConfig, TargetOptions};
use crate::error::{Result, TdiError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmInitMode {
    #[default]
    FastReconfig,
    Hitless,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WarmInitOptions {
    pub mode: WarmInitMode,
}

/// Target hook that performs warm init of a device. Called with the
/// device's state locked; implementations must not query the device state.
pub trait WarmInit: Send + Sync {
    fn begin(&self, dev_id: DevId, options: &WarmInitOptions) -> Result<()>;
    fn end(&self, dev_id: DevId) -> Result<()>;
}

pub struct DeviceRegistry {
    devices: Mutex<BTreeMap<DevId, Arc<Device>>>,
    warm_init: Option<Box<dyn WarmInit>>,
}

impl DeviceRegistry {
    pub fn new(warm_init: Option<Box<dyn WarmInit>>) -> Self {
        Self {
            devices: Mutex::new(BTreeMap::new()),
            warm_init,
        }
    }

    /// Construct a device and insert it. Schema parsing happens outside the
    /// registry lock; the id check is repeated under it.
    pub fn device_add(
        &self,
        dev_id: DevId,
        arch: ArchType,
        programs: Vec<ProgramConfig>,
        options: TargetOptions,
        cookie: Option<Cookie>,
    ) -> Result<Arc<Device>> {
        if self.devices.lock().contains_key(&dev_id) {
            return Err(already_added(dev_id));
        }
        let device = Arc::new(Device::new(dev_id, arch, programs, options, cookie)?);
        let mut devices = self.devices.lock();
        if devices.contains_key(&dev_id) {
            return Err(already_added(dev_id));
        }
        devices.insert(dev_id, Arc::clone(&device));
        info!(dev_id, %arch, "device added");
        Ok(device)
    }

    /// Removing an absent device is not an error.
    pub fn device_remove(&self, dev_id: DevId) {
        if self.devices.lock().remove(&dev_id).is_some() {
            info!(dev_id, "device removed");
        } else {
            debug!(dev_id, "device_remove on absent device");
        }
    }

    pub fn device_get(&self, dev_id: DevId) -> Result<Arc<Device>> {
        self.devices
            .lock()
            .get(&dev_id)
            .cloned()
            .ok_or_else(|| TdiError::not_found(format!("device {dev_id} not found")))
    }

    /// Sorted ids of every registered device.
    pub fn device_id_list(&self) -> Result<Vec<DevId>> {
        let devices = self.devices.lock();
        if devices.is_empty() {
            return Err(TdiError::not_found("no devices registered"));
        }
        Ok(devices.keys().copied().collect())
    }

    pub fn device_warm_init_begin(&self, dev_id: DevId, options: &WarmInitOptions) -> Result<()> {
        let strategy = self.strategy()?;
        let device = self.device_get(dev_id)?;
        device.transition(
            DeviceState::WarmInitInProgress,
            |state| match state {
                DeviceState::Cold | DeviceState::Active => Ok(()),
                DeviceState::WarmInitInProgress => Err(TdiError::invalid_state(format!(
                    "warm init already in progress on device {dev_id}"
                ))),
            },
            || {
                strategy.begin(dev_id, options).map_err(|err| {
                    warn!(dev_id, error = %err, "warm init begin failed");
                    err.context(format!("warm init begin on device {dev_id}"))
                })
            },
        )?;
        info!(dev_id, mode = ?options.mode, "warm init started");
        Ok(())
    }

    pub fn device_warm_init_end(&self, dev_id: DevId) -> Result<()> {
        let strategy = self.strategy()?;
        let device = self.device_get(dev_id)?;
        device.transition(
            DeviceState::Active,
            |state| {
                if state == DeviceState::WarmInitInProgress {
                    Ok(())
                } else {
                    Err(TdiError::invalid_state(format!(
                        "no warm init in progress on device {dev_id}"
                    )))
                }
            },
            || {
                strategy.end(dev_id).map_err(|err| {
                    warn!(dev_id, error = %err, "warm init end failed");
                    err.context(format!("warm init end on device {dev_id}"))
                })
            },
        )?;
        info!(dev_id, "warm init finished");
        Ok(())
    }

    fn strategy(&self) -> Result<&dyn WarmInit> {
        self.warm_init
            .as_deref()
            .ok_or_else(|| TdiError::internal("no warm init strategy was configured"))
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

fn already_added(dev_id: DevId) -> TdiError {
    TdiError::already_exists(format!("device {dev_id} already added"))
}

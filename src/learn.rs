//! Learn (digest) notification delivery.
//!
//! A target that can raise learn events supplies a [`LearnBackend`]. The
//! device hands it to every [`Learn`](crate::catalog::Learn) of its catalogs;
//! learns parsed without a device, or on a target with no backend, report
//! `NotSupported`. Every delivered message must be acknowledged with
//! `notify_ack` before the target can reuse its resources.

use crate::catalog::{FieldId, LearnId};
use crate::codec::DataValue;
use crate::device::{DevId, Target};
use crate::error::{Result, TdiError};
use crate::session::SessionId;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub type LearnMsgHandle = u64;

/// One batch of learn entries delivered to a callback. Each entry maps learn
/// field ids to their values.
#[derive(Clone, Debug, PartialEq)]
pub struct LearnMessage {
    pub target: Target,
    pub session: SessionId,
    pub learn_id: LearnId,
    pub handle: LearnMsgHandle,
    pub entries: Vec<BTreeMap<FieldId, DataValue>>,
}

/// Runs on the target's notification thread.
pub type LearnCallback = Arc<dyn Fn(&LearnMessage) + Send + Sync>;

/// Registers learn callbacks with a device.
pub trait LearnBackend: Send + Sync {
    fn callback_register(
        &self,
        session: SessionId,
        target: &Target,
        learn_id: LearnId,
        callback: LearnCallback,
    ) -> Result<()>;
    fn callback_deregister(&self, session: SessionId, target: &Target, learn_id: LearnId)
    -> Result<()>;
    fn notify_ack(&self, session: SessionId, learn_id: LearnId, handle: LearnMsgHandle)
    -> Result<()>;
}

struct Registration {
    session: SessionId,
    target: Target,
    callback: LearnCallback,
}

/// In-memory backend for targets without hardware and for tests. Messages are
/// injected with [`deliver`](Self::deliver).
#[derive(Default)]
pub struct RecordingLearnBackend {
    registrations: Mutex<BTreeMap<(DevId, LearnId), Registration>>,
    outstanding: Mutex<BTreeSet<(LearnId, LearnMsgHandle)>>,
    next_handle: Mutex<LearnMsgHandle>,
}

impl RecordingLearnBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, dev_id: DevId, learn_id: LearnId) -> bool {
        self.registrations.lock().contains_key(&(dev_id, learn_id))
    }

    /// Handles delivered but not yet acknowledged, in delivery order.
    pub fn outstanding(&self) -> Vec<LearnMsgHandle> {
        let mut handles: Vec<_> = self.outstanding.lock().iter().map(|(_, h)| *h).collect();
        handles.sort_unstable();
        handles
    }

    /// Invoke the callback registered for `learn_id` on `dev_id` and return
    /// the handle the message was delivered under.
    pub fn deliver(
        &self,
        dev_id: DevId,
        learn_id: LearnId,
        entries: Vec<BTreeMap<FieldId, DataValue>>,
    ) -> Result<LearnMsgHandle> {
        let (message, callback) = {
            let registrations = self.registrations.lock();
            let registration = registrations.get(&(dev_id, learn_id)).ok_or_else(|| {
                TdiError::not_found(format!(
                    "no callback registered for learn {learn_id} on device {dev_id}"
                ))
            })?;
            let handle = {
                let mut next = self.next_handle.lock();
                *next += 1;
                *next
            };
            let message = LearnMessage {
                target: registration.target.clone(),
                session: registration.session,
                learn_id,
                handle,
                entries,
            };
            (message, Arc::clone(&registration.callback))
        };
        self.outstanding.lock().insert((learn_id, message.handle));
        callback(&message);
        Ok(message.handle)
    }
}

impl LearnBackend for RecordingLearnBackend {
    fn callback_register(
        &self,
        session: SessionId,
        target: &Target,
        learn_id: LearnId,
        callback: LearnCallback,
    ) -> Result<()> {
        let key = (target.dev_id(), learn_id);
        let mut registrations = self.registrations.lock();
        if registrations.contains_key(&key) {
            return Err(TdiError::already_exists(format!(
                "learn {learn_id} already has a callback on device {}",
                key.0
            )));
        }
        registrations.insert(
            key,
            Registration {
                session,
                target: target.clone(),
                callback,
            },
        );
        debug!(dev_id = key.0, learn_id, session, "learn callback registered");
        Ok(())
    }

    fn callback_deregister(
        &self,
        session: SessionId,
        target: &Target,
        learn_id: LearnId,
    ) -> Result<()> {
        let key = (target.dev_id(), learn_id);
        if self.registrations.lock().remove(&key).is_none() {
            return Err(TdiError::not_found(format!(
                "learn {learn_id} has no callback on device {}",
                key.0
            )));
        }
        debug!(dev_id = key.0, learn_id, session, "learn callback deregistered");
        Ok(())
    }

    fn notify_ack(
        &self,
        session: SessionId,
        learn_id: LearnId,
        handle: LearnMsgHandle,
    ) -> Result<()> {
        if !self.outstanding.lock().remove(&(learn_id, handle)) {
            return Err(TdiError::invalid_argument(format!(
                "learn {learn_id} has no outstanding message {handle}"
            )));
        }
        debug!(learn_id, handle, session, "learn message acknowledged");
        Ok(())
    }
}

impl fmt::Debug for RecordingLearnBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingLearnBackend")
            .field("registered", &self.registrations.lock().len())
            .field("outstanding", &self.outstanding.lock().len())
            .finish()
    }
}

//! Session state machine for batching and transactions.
//!
//! A session is Idle, has one batch open, or has one transaction open. There
//! is no nesting. The actual work is delegated to a [`SessionBackend`]; the
//! session only enforces ordering. Calls that close a batch or transaction
//! return the session to Idle even when the backend reports a failure.

use crate::error::{Result, Status, TdiError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub type SessionId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    BatchOpen,
    TxnOpen { atomic: bool },
}

/// Executes session operations against a device.
pub trait SessionBackend: Send + Sync {
    fn begin_batch(&self, session: SessionId) -> Result<()>;
    fn flush_batch(&self, session: SessionId) -> Result<()>;
    fn end_batch(&self, session: SessionId, hw_synchronous: bool) -> Result<()>;
    fn begin_transaction(&self, session: SessionId, atomic: bool) -> Result<()>;
    fn verify_transaction(&self, session: SessionId) -> Result<()>;
    fn commit_transaction(&self, session: SessionId, hw_synchronous: bool) -> Result<()>;
    fn abort_transaction(&self, session: SessionId) -> Result<()>;
    /// Blocks until every operation issued on `session` has completed.
    fn complete_operations(&self, session: SessionId) -> Result<()>;
    fn destroy(&self, session: SessionId) -> Result<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    BeginBatch,
    FlushBatch,
    EndBatch { hw_synchronous: bool },
    BeginTransaction { atomic: bool },
    VerifyTransaction,
    CommitTransaction { hw_synchronous: bool },
    AbortTransaction,
    CompleteOperations,
    Destroy,
}

impl SessionEvent {
    fn label(&self) -> &'static str {
        match self {
            SessionEvent::BeginBatch => "begin_batch",
            SessionEvent::FlushBatch => "flush_batch",
            SessionEvent::EndBatch { .. } => "end_batch",
            SessionEvent::BeginTransaction { .. } => "begin_transaction",
            SessionEvent::VerifyTransaction => "verify_transaction",
            SessionEvent::CommitTransaction { .. } => "commit_transaction",
            SessionEvent::AbortTransaction => "abort_transaction",
            SessionEvent::CompleteOperations => "complete_operations",
            SessionEvent::Destroy => "destroy",
        }
    }
}

/// In-memory backend that records every call. Used by targets without
/// hardware and by tests.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    events: Mutex<Vec<(SessionId, SessionEvent)>>,
    fail_on: Mutex<Option<&'static str>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call named `operation` (e.g. `"commit_transaction"`)
    /// fail with `TableLocked`. The call is still recorded.
    pub fn fail_on(&self, operation: &'static str) {
        *self.fail_on.lock() = Some(operation);
    }

    pub fn clear_failure(&self) {
        *self.fail_on.lock() = None;
    }

    pub fn events(&self) -> Vec<(SessionId, SessionEvent)> {
        self.events.lock().clone()
    }

    pub fn events_for(&self, session: SessionId) -> Vec<SessionEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(id, _)| *id == session)
            .map(|(_, event)| event.clone())
            .collect()
    }

    fn record(&self, session: SessionId, event: SessionEvent) -> Result<()> {
        let label = event.label();
        self.events.lock().push((session, event));
        if *self.fail_on.lock() == Some(label) {
            return Err(TdiError::new(
                Status::TableLocked,
                format!("{label} rejected for session {session}"),
            ));
        }
        Ok(())
    }
}

impl SessionBackend for RecordingBackend {
    fn begin_batch(&self, session: SessionId) -> Result<()> {
        self.record(session, SessionEvent::BeginBatch)
    }

    fn flush_batch(&self, session: SessionId) -> Result<()> {
        self.record(session, SessionEvent::FlushBatch)
    }

    fn end_batch(&self, session: SessionId, hw_synchronous: bool) -> Result<()> {
        self.record(session, SessionEvent::EndBatch { hw_synchronous })
    }

    fn begin_transaction(&self, session: SessionId, atomic: bool) -> Result<()> {
        self.record(session, SessionEvent::BeginTransaction { atomic })
    }

    fn verify_transaction(&self, session: SessionId) -> Result<()> {
        self.record(session, SessionEvent::VerifyTransaction)
    }

    fn commit_transaction(&self, session: SessionId, hw_synchronous: bool) -> Result<()> {
        self.record(session, SessionEvent::CommitTransaction { hw_synchronous })
    }

    fn abort_transaction(&self, session: SessionId) -> Result<()> {
        self.record(session, SessionEvent::AbortTransaction)
    }

    fn complete_operations(&self, session: SessionId) -> Result<()> {
        self.record(session, SessionEvent::CompleteOperations)
    }

    fn destroy(&self, session: SessionId) -> Result<()> {
        self.record(session, SessionEvent::Destroy)
    }
}

struct Inner {
    state: SessionState,
    destroyed: bool,
}

pub struct Session {
    id: SessionId,
    backend: Arc<dyn SessionBackend>,
    inner: Mutex<Inner>,
}

impl Session {
    pub(crate) fn new(id: SessionId, backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            id,
            backend,
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                destroyed: false,
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_valid(&self) -> bool {
        !self.inner.lock().destroyed
    }

    pub fn begin_batch(&self) -> Result<()> {
        let mut inner = self.live()?;
        self.expect_state(&inner, "begin_batch", |s| s == SessionState::Idle)?;
        self.backend.begin_batch(self.id)?;
        inner.state = SessionState::BatchOpen;
        debug!(session_id = self.id, "batch opened");
        Ok(())
    }

    pub fn flush_batch(&self) -> Result<()> {
        let inner = self.live()?;
        self.expect_state(&inner, "flush_batch", |s| s == SessionState::BatchOpen)?;
        self.backend.flush_batch(self.id)
    }

    pub fn end_batch(&self, hw_synchronous: bool) -> Result<()> {
        let mut inner = self.live()?;
        self.expect_state(&inner, "end_batch", |s| s == SessionState::BatchOpen)?;
        inner.state = SessionState::Idle;
        debug!(session_id = self.id, hw_synchronous, "batch closed");
        self.backend.end_batch(self.id, hw_synchronous)
    }

    pub fn begin_transaction(&self, atomic: bool) -> Result<()> {
        let mut inner = self.live()?;
        self.expect_state(&inner, "begin_transaction", |s| s == SessionState::Idle)?;
        self.backend.begin_transaction(self.id, atomic)?;
        inner.state = SessionState::TxnOpen { atomic };
        debug!(session_id = self.id, atomic, "transaction opened");
        Ok(())
    }

    /// Ask the backend whether the open transaction would commit. The
    /// transaction is closed either way.
    pub fn verify_transaction(&self) -> Result<()> {
        let mut inner = self.live()?;
        self.expect_state(&inner, "verify_transaction", is_txn)?;
        inner.state = SessionState::Idle;
        debug!(session_id = self.id, "transaction verified");
        self.backend.verify_transaction(self.id)
    }

    pub fn commit_transaction(&self, hw_synchronous: bool) -> Result<()> {
        let mut inner = self.live()?;
        self.expect_state(&inner, "commit_transaction", is_txn)?;
        inner.state = SessionState::Idle;
        debug!(session_id = self.id, hw_synchronous, "transaction committed");
        self.backend.commit_transaction(self.id, hw_synchronous)
    }

    pub fn abort_transaction(&self) -> Result<()> {
        let mut inner = self.live()?;
        self.expect_state(&inner, "abort_transaction", is_txn)?;
        inner.state = SessionState::Idle;
        debug!(session_id = self.id, "transaction aborted");
        self.backend.abort_transaction(self.id)
    }

    /// Barrier: returns once the backend has drained this session.
    pub fn complete_operations(&self) -> Result<()> {
        let _inner = self.live()?;
        self.backend.complete_operations(self.id)
    }

    pub fn destroy(&self) -> Result<()> {
        let mut inner = self.live()?;
        inner.destroyed = true;
        inner.state = SessionState::Idle;
        debug!(session_id = self.id, "session destroyed");
        self.backend.destroy(self.id)
    }

    fn live(&self) -> Result<parking_lot::MutexGuard<'_, Inner>> {
        let inner = self.inner.lock();
        if inner.destroyed {
            return Err(TdiError::invalid_state(format!(
                "session {} has been destroyed",
                self.id
            )));
        }
        Ok(inner)
    }

    fn expect_state(
        &self,
        inner: &Inner,
        operation: &str,
        allowed: impl Fn(SessionState) -> bool,
    ) -> Result<()> {
        if allowed(inner.state) {
            return Ok(());
        }
        Err(TdiError::invalid_state(format!(
            "{operation} not allowed on session {} in state {:?}",
            self.id, inner.state
        )))
    }
}

fn is_txn(state: SessionState) -> bool {
    matches!(state, SessionState::TxnOpen { .. })
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("destroyed", &inner.destroyed)
            .finish()
    }
}

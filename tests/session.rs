// Batch and transaction ordering rules.

use anyhow::Result;
use std::sync::Arc;
use std::thread;
use tdi_catalog::session::SessionEvent;
use tdi_catalog::{
    ArchType, Device, RecordingBackend, Session, SessionState, Status, TargetOptions,
};

fn device_with_backend() -> Result<(Device, Arc<RecordingBackend>)> {
    let backend = Arc::new(RecordingBackend::new());
    let options = TargetOptions {
        session_backend: Some(backend.clone()),
        ..TargetOptions::default()
    };
    let device = Device::new(0, ArchType::Tna, Vec::new(), options, None)?;
    Ok((device, backend))
}

fn open_session() -> Result<(Session, Arc<RecordingBackend>)> {
    let (device, backend) = device_with_backend()?;
    Ok((device.create_session()?, backend))
}

#[test]
fn batch_lifecycle() -> Result<()> {
    let (session, backend) = open_session()?;
    assert_eq!(
        session.flush_batch().unwrap_err().status(),
        Status::InvalidState
    );

    session.begin_batch()?;
    assert_eq!(session.state(), SessionState::BatchOpen);
    assert_eq!(
        session.begin_batch().unwrap_err().status(),
        Status::InvalidState
    );
    session.flush_batch()?;
    session.end_batch(true)?;
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(
        session.end_batch(false).unwrap_err().status(),
        Status::InvalidState
    );

    assert_eq!(
        backend.events_for(session.id()),
        vec![
            SessionEvent::BeginBatch,
            SessionEvent::FlushBatch,
            SessionEvent::EndBatch {
                hw_synchronous: true
            },
        ]
    );
    Ok(())
}

#[test]
fn transactions_do_not_nest_with_batches() -> Result<()> {
    let (session, _backend) = open_session()?;
    session.begin_transaction(true)?;
    assert_eq!(session.state(), SessionState::TxnOpen { atomic: true });
    assert_eq!(
        session.begin_batch().unwrap_err().status(),
        Status::InvalidState
    );
    assert_eq!(
        session.begin_transaction(false).unwrap_err().status(),
        Status::InvalidState
    );
    session.abort_transaction()?;

    session.begin_batch()?;
    assert_eq!(
        session.begin_transaction(false).unwrap_err().status(),
        Status::InvalidState
    );
    Ok(())
}

#[test]
fn double_commit_fails() -> Result<()> {
    let (session, _backend) = open_session()?;
    session.begin_transaction(false)?;
    session.commit_transaction(true)?;
    assert_eq!(
        session.commit_transaction(true).unwrap_err().status(),
        Status::InvalidState
    );
    assert_eq!(
        session.abort_transaction().unwrap_err().status(),
        Status::InvalidState
    );
    Ok(())
}

#[test]
fn verify_always_closes_the_transaction() -> Result<()> {
    let (session, backend) = open_session()?;
    session.begin_transaction(true)?;
    session.verify_transaction()?;
    assert_eq!(session.state(), SessionState::Idle);

    session.begin_transaction(true)?;
    backend.fail_on("verify_transaction");
    let err = session.verify_transaction().unwrap_err();
    assert_eq!(err.status(), Status::TableLocked);
    assert_eq!(session.state(), SessionState::Idle);
    Ok(())
}

#[test]
fn complete_operations_is_allowed_in_any_state() -> Result<()> {
    let (session, backend) = open_session()?;
    session.complete_operations()?;
    session.begin_batch()?;
    session.complete_operations()?;
    session.end_batch(false)?;
    let barriers = backend
        .events_for(session.id())
        .into_iter()
        .filter(|e| *e == SessionEvent::CompleteOperations)
        .count();
    assert_eq!(barriers, 2);
    Ok(())
}

#[test]
fn destroyed_session_rejects_everything() -> Result<()> {
    let (session, backend) = open_session()?;
    session.begin_batch()?;
    session.destroy()?;
    assert!(!session.is_valid());
    for result in [
        session.begin_batch(),
        session.begin_transaction(false),
        session.complete_operations(),
        session.destroy(),
    ] {
        assert_eq!(result.unwrap_err().status(), Status::InvalidState);
    }
    assert_eq!(
        backend.events_for(session.id()).last(),
        Some(&SessionEvent::Destroy)
    );
    Ok(())
}

#[test]
fn sessions_on_one_device_are_independent() -> Result<()> {
    let (device, backend) = device_with_backend()?;
    let sessions: Vec<Session> = (0..4)
        .map(|_| device.create_session())
        .collect::<tdi_catalog::Result<_>>()?;

    thread::scope(|scope| {
        for (index, session) in sessions.iter().enumerate() {
            scope.spawn(move || -> tdi_catalog::Result<()> {
                if index % 2 == 0 {
                    session.begin_batch()?;
                    session.end_batch(false)
                } else {
                    session.begin_transaction(true)?;
                    session.commit_transaction(false)
                }
            });
        }
    });

    for (index, session) in sessions.iter().enumerate() {
        assert_eq!(session.state(), SessionState::Idle);
        let events = backend.events_for(session.id());
        assert_eq!(events.len(), 2, "session {index}: {events:?}");
    }
    Ok(())
}

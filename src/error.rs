//! Error types for the ring logger.
//!
//! Every fallible operation returns [`Result<T>`]. Contention drops are not
//! errors: they surface as [`LogOutcome::EventLocked`](crate::LogOutcome).

use std::io;

use thiserror::Error;

use crate::registry::{BufferId, LockState};

/// Coarse classification of a [`LogError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The engine has not been initialized, or has been shut down.
    NotInitialized,
    /// `init` was called twice without a `shutdown` in between.
    AlreadyInitialized,
    /// Logging is switched off.
    Disabled,
    /// Unknown buffer id, missing default buffer or unregistered event type.
    InvalidTarget,
    /// A bounded table is full or slot storage could not be allocated.
    ResourceExhausted,
    /// The coordination lock was found in an unexpected state.
    LockFailure,
    /// Writing rendered output to a sink failed.
    Output,
}

/// Errors returned by the ring logger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("ring logger is not initialized")]
    NotInitialized,

    #[error("ring logger is already initialized")]
    AlreadyInitialized,

    #[error("logging is disabled")]
    Disabled,

    #[error("unknown buffer id {0}")]
    UnknownBuffer(BufferId),

    #[error("no default buffer has been created")]
    NoDefaultBuffer,

    #[error("buffer {0} is the default buffer and cannot be deleted")]
    DefaultBufferInUse(BufferId),

    #[error("invalid extended event type {0}")]
    InvalidEventType(u32),

    #[error("buffer table is full ({0} buffers)")]
    BufferTableFull(usize),

    #[error("extended event table is full ({0} entries)")]
    EventTableFull(usize),

    #[error("could not allocate {0} slots")]
    SlotAllocation(usize),

    #[error("coordination lock is {0}, expected unlocked")]
    LockState(LockState),

    #[error("failed to write output: {0}")]
    Output(io::ErrorKind),
}

impl LogError {
    /// Returns the taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LogError::NotInitialized => ErrorKind::NotInitialized,
            LogError::AlreadyInitialized => ErrorKind::AlreadyInitialized,
            LogError::Disabled => ErrorKind::Disabled,
            LogError::UnknownBuffer(_)
            | LogError::NoDefaultBuffer
            | LogError::DefaultBufferInUse(_)
            | LogError::InvalidEventType(_) => ErrorKind::InvalidTarget,
            LogError::BufferTableFull(_)
            | LogError::EventTableFull(_)
            | LogError::SlotAllocation(_) => ErrorKind::ResourceExhausted,
            LogError::LockState(_) => ErrorKind::LockFailure,
            LogError::Output(_) => ErrorKind::Output,
        }
    }
}

impl From<io::Error> for LogError {
    fn from(err: io::Error) -> Self {
        LogError::Output(err.kind())
    }
}

pub type Result<T> = std::result::Result<T, LogError>;

//! Error types for the simulation layer

use thiserror::Error;
use tokio::task::JoinError;

use crate::ether::DeviceId;

/// Errors returned by the ether
#[derive(Debug, Error)]
pub enum EtherError {
    /// The endpoint is not attached to this ether
    #[error("{0} is not registered with the ether")]
    DeviceNotRegistered(DeviceId),

    /// The endpoint is already attached to this ether
    #[error("{0} is already registered with the ether")]
    DeviceAlreadyRegistered(DeviceId),

    /// The actor exited before answering
    #[error("ether stopped before {operation} completed")]
    Stopped { operation: &'static str },

    /// The actor task panicked or was cancelled
    #[error("ether task failed: {0}")]
    Task(#[from] JoinError),

    /// Several failures while shutting down
    #[error("{} errors while shutting down the ether: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<EtherError>),
}

impl EtherError {
    /// Fold a list of failures into a single result
    pub fn combine(mut errors: Vec<EtherError>) -> Result<(), EtherError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(EtherError::Multiple(errors)),
        }
    }
}

fn join_errors(errors: &[EtherError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors returned by a fake device
#[derive(Debug, Error)]
pub enum SimError {
    /// I/O error on the command stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Address outside user NVM
    #[error("NVM address 0x{0:04X} out of bounds")]
    NvmOutOfBounds(u16),

    /// The interpreter task panicked or was cancelled
    #[error("fake device task failed: {0}")]
    Task(#[from] JoinError),
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Precondition,
    Adapter,
    Protocol,
    Machine,
}

/// Error as shown to the UI surface inside a state snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedError {
    pub code: ErrorCode,
    pub message: String,
}

impl ReportedError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("workspace '{}' is not empty; open an empty folder to start a tutorial", .0.display())]
    WorkspaceNotEmpty(PathBuf),
    #[error("tutorial repo uri not found")]
    MissingTutorialUri,
    #[error("no workspace root path")]
    NoWorkspaceRoot,
    #[error("path '{0}' resolves outside the workspace")]
    PathOutsideWorkspace(String),
}

impl From<PreconditionError> for ReportedError {
    fn from(value: PreconditionError) -> Self {
        Self::new(ErrorCode::Precondition, value.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed inbound message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid payload for action '{action}': {reason}")]
    InvalidPayload { action: String, reason: String },
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("tutorial machine is already active")]
    AlreadyActive,
    #[error("tutorial machine has not been activated")]
    NotActive,
}

impl From<MachineError> for ReportedError {
    fn from(value: MachineError) -> Self {
        Self::new(ErrorCode::Machine, value.to_string())
    }
}

use git_checkpoint::GitError;
use shared::error::{ErrorCode, MachineError, PreconditionError, ProtocolError, ReportedError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error("git: {0}")]
    Git(#[from] GitError),
    #[error("storage: {0}")]
    Storage(#[source] anyhow::Error),
    #[error("editor host: {0}")]
    Host(#[source] anyhow::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Machine(#[from] MachineError),
}

impl CoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::Precondition(_) => ErrorCode::Precondition,
            CoreError::Git(GitError::WorkspaceNotEmpty(_)) => ErrorCode::Precondition,
            CoreError::Git(_) | CoreError::Storage(_) | CoreError::Host(_) => ErrorCode::Adapter,
            CoreError::Protocol(_) => ErrorCode::Protocol,
            CoreError::Machine(_) => ErrorCode::Machine,
        }
    }

    pub fn reported(&self) -> ReportedError {
        ReportedError::new(self.code(), self.to_string())
    }
}

use thiserror::Error;

/// Failures of external tools.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program could not be started at all.
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited non-zero.
    #[error("{message}")]
    Failed {
        command: String,
        code: Option<i32>,
        message: String,
    },

    /// The program did not finish in time and was killed.
    #[error("External tool '{command}' unresponsive after {secs} seconds")]
    Timeout { command: String, secs: u64 },
}

impl ExecError {
    pub fn command(&self) -> &str {
        match self {
            ExecError::Spawn { command, .. }
            | ExecError::Failed { command, .. }
            | ExecError::Timeout { command, .. } => command,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::Timeout { .. })
    }
}

pub type ExecResult<T> = Result<T, ExecError>;

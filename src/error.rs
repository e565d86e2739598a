use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("gpg {operation}: command execution failed: {source}")]
    Spawn {
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("gpg {operation} exited with status {status}: {stderr}")]
    Gpg {
        operation: &'static str,
        status: i32,
        stderr: String,
    },

    #[error("gpg {operation}: permission denied")]
    PermissionDenied { operation: &'static str },

    #[error("invalid key selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("no recipients given")]
    NoRecipients,

    #[error("failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("gpg {operation}: timed out after {secs} seconds")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("gpg {operation}: operation was cancelled")]
    Cancelled { operation: &'static str },
}

impl Error {
    /// Fills in the operation of invocation errors a [`Runner`] left
    /// unnamed.
    ///
    /// [`Runner`]: crate::Runner
    pub(crate) fn with_operation(mut self, name: &'static str) -> Self {
        match &mut self {
            Self::Spawn { operation, .. }
            | Self::Gpg { operation, .. }
            | Self::PermissionDenied { operation }
            | Self::Timeout { operation, .. }
            | Self::Cancelled { operation } => {
                if operation.is_empty() {
                    *operation = name;
                }
            }
            _ => {}
        }
        self
    }
}

pub type Result<T> = std::result::Result<T, Error>;

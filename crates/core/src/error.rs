//! Error type for the build-and-test pipeline

use crate::report::TestReport;
use std::{io, path::PathBuf};
use thiserror::Error;

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

/// Failures surfaced by [`crate::run`] and the steps it is made of
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The request itself is unusable (bad project name, unsafe file path)
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to update Anchor.toml: {0}")]
    Manifest(String),

    #[error("Failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// `anchor build` exited unsuccessfully
    #[error("Failed to compile project: {status}")]
    BuildFailed { status: String, output: String },

    /// `anchor test` exited unsuccessfully; the report is parsed from whatever it printed
    #[error("Failed to test project: {status}")]
    TestFailed {
        status: String,
        report: Box<TestReport>,
    },
}

impl HarnessError {
    /// Builds a `map_err` adapter that attaches the failing action and path to an I/O error
    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            action,
            path,
            source,
        }
    }

    /// Whether the failure was caused by the caller rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_message() {
        let err = HarnessError::io("Failed to write", "/ws/tests/a.ts")(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(err.to_string(), "Failed to write /ws/tests/a.ts: denied");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_toolchain_messages() {
        let err = HarnessError::BuildFailed {
            status: "exit status: 1".to_string(),
            output: String::new(),
        };
        assert_eq!(err.to_string(), "Failed to compile project: exit status: 1");

        let err = HarnessError::InvalidRequest("projectName is required".to_string());
        assert!(err.is_client_error());
    }
}

//! Process exit codes
//!
//! Commands return an `ExitCode`; only `main` turns it into a process exit.

use stow_core::Error;

/// Exit codes shared by every command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Bad arguments or paths
    UsageError = 2,
    NetworkError = 3,
    /// Credentials rejected or access denied
    AuthError = 4,
    NotFound = 5,
    /// Resource is busy or already exists
    Conflict = 6,
    UnsupportedFeature = 7,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// The exit code for a fatal error
    pub fn from_error(error: &Error) -> Self {
        match error.root() {
            Error::ConfigNotFound(_)
            | Error::AliasNotFound(_)
            | Error::InvalidSessionId(_)
            | Error::BrokenSymlink(_)
            | Error::NotFound(_) => ExitCode::NotFound,
            Error::InvalidPath(_) => ExitCode::UsageError,
            Error::UnsupportedUrlScheme(_) | Error::UnsupportedFeature(_) => {
                ExitCode::UnsupportedFeature
            }
            Error::PermissionDenied(_) => ExitCode::AuthError,
            Error::SessionLocked(_) => ExitCode::Conflict,
            Error::Network(_) => ExitCode::NetworkError,
            Error::Config(_)
            | Error::SessionCorrupt { .. }
            | Error::BrokenPipe
            | Error::Io(_)
            | Error::BackendFailure(_)
            | Error::General(_)
            | Error::Target { .. } => ExitCode::GeneralError,
        }
    }
}

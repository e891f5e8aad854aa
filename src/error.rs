//! Crate-wide error taxonomy.  Every fallible operation in the engine
//! returns [`Result`]; nothing in this crate panics outside of tests.

use alloc::string::String;

use thiserror::Error;

use crate::statemachine::TapState;

/// Errors produced by the protocol engine and the fuzzing scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The engine was used before a transport was attached.
    #[error("engine not initialized")]
    NotInitialized,
    /// Configuration validation failed; the configuration is rejected as a
    /// unit and never partially applied.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A fuzzing session is already running.
    #[error("a fuzzing session is already active")]
    AlreadyActive,
    /// No fuzzing session is running.
    #[error("no fuzzing session is active")]
    NotActive,
    /// The TAP controller has no direct route to the requested state.
    #[error("no direct route to TAP state {0}")]
    UnsupportedTransition(TapState),
    /// A shift was requested with a zero length or a length that does not
    /// fit the provided buffer.
    #[error("shift length must be non-zero and fit the payload buffer")]
    InvalidLength,
    /// No response was observed within the operation's budget.
    #[error("operation timed out")]
    Timeout,
    /// Transport-level I/O failure.
    #[error("hardware fault: {0}")]
    Hardware(&'static str),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Small discriminated status consumed by the command layer.  There is no
/// process-level exit code in firmware, so command handlers report one of
/// these instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    InvalidArgs,
    NotReady,
    Busy,
    Error,
}

impl Error {
    /// Map an error onto the command-layer status taxonomy.
    pub fn status(&self) -> Status {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidLength
            | Error::UnsupportedTransition(_)
            | Error::NotActive => Status::InvalidArgs,
            Error::NotInitialized => Status::NotReady,
            Error::AlreadyActive => Status::Busy,
            Error::Timeout | Error::Hardware(_) => Status::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(Error::NotInitialized.status(), Status::NotReady);
        assert_eq!(Error::AlreadyActive.status(), Status::Busy);
        assert_eq!(
            Error::InvalidConfig("x".into()).status(),
            Status::InvalidArgs
        );
        assert_eq!(Error::Hardware("tdo").status(), Status::Error);
    }
}

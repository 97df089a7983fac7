//! Error handling types and utilities for the cosign multisig engine.
//!
//! Errors are grouped into three categories: validation errors caused by bad
//! input, state errors raised by the operation lifecycle, and failures of
//! external collaborators (persistence, chain connections, wallet registry).

use thiserror::Error;

/// Core error type for cosign operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Threshold outside of `[2, members]`
    #[error("invalid threshold:: {threshold} for {members} members")]
    InvalidThreshold { threshold: u16, members: usize },

    /// Descriptor without members
    #[error("empty member set")]
    EmptyMemberSet,

    /// A wrapper context could not be resolved to a chain connection
    #[error("unresolved wrapper context:: {0}")]
    UnresolvedWrapperContext(String),

    /// Externally supplied identity does not match the recomputed one
    #[error("identity mismatch:: expected {expected}, got {actual}")]
    IdentityMismatch { expected: String, actual: String },

    /// Supplied call data does not hash to the operation's call hash
    #[error("call data mismatch:: {0}")]
    CallDataMismatch(String),

    /// Account is not a member of the multisig
    #[error("not a signatory:: {0}")]
    NotASignatory(String),

    /// No operation exists for the key
    #[error("unknown operation:: {0}")]
    UnknownOperation(String),

    /// Operation already executed, cancelled or errored
    #[error("terminal operation:: {0}")]
    TerminalOperation(String),

    /// A reject or final approval is already being broadcast
    #[error("operation in flight:: {0}")]
    OperationInFlight(String),

    /// Only the depositor may cancel an operation
    #[error("not depositor:: {0}")]
    NotDepositor(String),

    /// The operation's on-chain timepoint is not known yet
    #[error("missing timepoint:: {0}")]
    MissingTimepoint(String),

    /// Persistence collaborator failed
    #[error("persistence failure:: {0}")]
    Persistence(String),

    /// Broadcasting an extrinsic failed
    #[error("broadcast failure:: {0}")]
    Broadcast(String),

    /// Chain connection failure other than broadcast
    #[error("chain failure:: {0}")]
    Chain(String),

    /// Wallet registry failure
    #[error("wallet registry failure:: {0}")]
    Wallet(String),
}

/// Result type alias for cosign operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification used by callers to decide how to surface an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Deterministic, caused by bad input, never retried
    Validation,
    /// Lifecycle conflicts, logged and treated as benign
    State,
    /// External collaborator failures
    Io,
}

impl Error {
    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidThreshold { .. }
            | Error::EmptyMemberSet
            | Error::UnresolvedWrapperContext(_)
            | Error::IdentityMismatch { .. }
            | Error::CallDataMismatch(_)
            | Error::NotASignatory(_) => ErrorCategory::Validation,
            Error::UnknownOperation(_)
            | Error::TerminalOperation(_)
            | Error::OperationInFlight(_)
            | Error::NotDepositor(_)
            | Error::MissingTimepoint(_) => ErrorCategory::State,
            Error::Persistence(_) | Error::Broadcast(_) | Error::Chain(_) | Error::Wallet(_) => {
                ErrorCategory::Io
            }
        }
    }

    /// Numeric error code
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidThreshold { .. } => codes::INVALID_THRESHOLD,
            Error::EmptyMemberSet => codes::EMPTY_MEMBER_SET,
            Error::UnresolvedWrapperContext(_) => codes::UNRESOLVED_WRAPPER,
            Error::IdentityMismatch { .. } => codes::IDENTITY_MISMATCH,
            Error::CallDataMismatch(_) => codes::CALL_DATA_MISMATCH,
            Error::NotASignatory(_) => codes::NOT_A_SIGNATORY,
            Error::UnknownOperation(_) => codes::UNKNOWN_OPERATION,
            Error::TerminalOperation(_) => codes::TERMINAL_OPERATION,
            Error::OperationInFlight(_) => codes::IN_FLIGHT,
            Error::NotDepositor(_) => codes::NOT_DEPOSITOR,
            Error::MissingTimepoint(_) => codes::MISSING_TIMEPOINT,
            Error::Persistence(_) => codes::PERSISTENCE,
            Error::Broadcast(_) => codes::BROADCAST,
            Error::Chain(_) => codes::CHAIN,
            Error::Wallet(_) => codes::WALLET,
        }
    }

    /// Whether the error comes from an external collaborator
    pub fn is_io(&self) -> bool {
        self.category() == ErrorCategory::Io
    }
}

/// Error codes, grouped by category
pub mod codes {
    /// Success
    pub const OK: u32 = 0;

    // validation: 1xx
    pub const INVALID_THRESHOLD: u32 = 101;
    pub const EMPTY_MEMBER_SET: u32 = 102;
    pub const UNRESOLVED_WRAPPER: u32 = 103;
    pub const IDENTITY_MISMATCH: u32 = 104;
    pub const CALL_DATA_MISMATCH: u32 = 105;
    pub const NOT_A_SIGNATORY: u32 = 106;

    // state: 2xx
    pub const UNKNOWN_OPERATION: u32 = 201;
    pub const TERMINAL_OPERATION: u32 = 202;
    pub const IN_FLIGHT: u32 = 203;
    pub const NOT_DEPOSITOR: u32 = 204;
    pub const MISSING_TIMEPOINT: u32 = 205;

    // external io: 3xx
    pub const PERSISTENCE: u32 = 301;
    pub const BROADCAST: u32 = 302;
    pub const CHAIN: u32 = 303;
    pub const WALLET: u32 = 304;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidThreshold {
            threshold: 1,
            members: 3,
        };
        assert_eq!(err.to_string(), "invalid threshold:: 1 for 3 members");

        let err = Error::UnknownOperation("polkadot/0xab".to_string());
        assert_eq!(err.to_string(), "unknown operation:: polkadot/0xab");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(Error::EmptyMemberSet.category(), ErrorCategory::Validation);
        assert_eq!(
            Error::TerminalOperation(String::new()).category(),
            ErrorCategory::State
        );
        assert!(Error::Persistence("disk full".into()).is_io());
        assert!(!Error::OperationInFlight(String::new()).is_io());
    }

    #[test]
    fn test_codes_are_grouped() {
        assert_eq!(Error::EmptyMemberSet.code() / 100, 1);
        assert_eq!(Error::NotDepositor(String::new()).code() / 100, 2);
        assert_eq!(Error::Broadcast(String::new()).code() / 100, 3);
    }
}

//! Error handling for the election engine
//!
//! Every public operation returns one of these discriminated kinds to its
//! immediate caller; nothing is swallowed except row-level parse failures
//! during snapshot load, which are warn-logged and skipped.

use crate::types::ElectionPhase;

/// Result type alias for the election engine
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the election engine
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The email is already registered to another user
    #[error("email already registered: {email}")]
    DuplicateEmail { email: String },

    /// An admin account already exists; at most one is permitted
    #[error("an admin account already exists")]
    AdminLimitExceeded,

    /// Unknown id or email
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Password or admin PIN verification failed
    #[error("invalid credential")]
    InvalidCredential,

    /// Missing session, or the session's role does not permit the action
    #[error("unauthorized: {action}")]
    Unauthorized { action: String },

    /// The operation is not legal in the election's current phase
    #[error("operation not permitted in phase {phase:?}")]
    PhaseViolation { phase: ElectionPhase },

    /// Candidate choice index out of range
    #[error("choice {choice} out of range ({candidates} candidates)")]
    InvalidChoice { choice: u32, candidates: u32 },

    /// The voter already has a vote recorded for this election
    #[error("voter has already voted in this election")]
    AlreadyVoted,

    /// Candidate list rejected at election creation
    #[error("invalid candidate list: {reason}")]
    InvalidCandidates { reason: String },

    /// Resource exhaustion in the indexed map or collections
    #[error("allocation failure in {what}")]
    AllocationFailure { what: String },

    /// Snapshot read/write error
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl Error {
    /// Create a new not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a new unauthorized error
    pub fn unauthorized(action: impl Into<String>) -> Self {
        Self::Unauthorized {
            action: action.into(),
        }
    }

    /// Create a new allocation-failure error
    pub fn allocation(what: impl Into<String>) -> Self {
        Self::AllocationFailure { what: what.into() }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let nf = Error::not_found("election 7");
        assert!(matches!(nf, Error::NotFound { .. }));

        let unauth = Error::unauthorized("create_election");
        assert!(matches!(unauth, Error::Unauthorized { .. }));

        let alloc = Error::allocation("indexed map");
        assert!(matches!(alloc, Error::AllocationFailure { .. }));
    }

    #[test]
    fn test_phase_violation_display() {
        let err = Error::PhaseViolation {
            phase: ElectionPhase::VotingClosed,
        };
        assert!(err.to_string().contains("VotingClosed"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}

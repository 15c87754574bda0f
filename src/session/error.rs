use super::bank::BankError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Surfaced to the joining connection only
    #[error("{0}")]
    Validation(String),

    /// Host-only command from a non-host connection; ignored
    #[error("Only the host can do that")]
    Unauthorized,

    /// Late, duplicate, or out-of-phase action; ignored
    #[error("Stale action: {0}")]
    Stale(StaleReason),

    #[error("No questions loaded")]
    EmptyBank,

    #[error(transparent)]
    Bank(#[from] BankError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StaleReason {
    #[error("unknown player")]
    UnknownPlayer,
    #[error("no active round")]
    NoActiveRound,
    #[error("round is paused")]
    Paused,
    #[error("deadline has passed")]
    PastDeadline,
    #[error("not valid in the current status")]
    WrongStatus,
    #[error("already answered this round")]
    AlreadyAnswered,
    #[error("choice index out of range")]
    ChoiceOutOfRange,
    #[error("round is not paused")]
    NotPaused,
}

pub type SessionResult<T = ()> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_reason_messages() {
        assert_eq!(StaleReason::PastDeadline.to_string(), "deadline has passed");
        assert_eq!(
            SessionError::Stale(StaleReason::AlreadyAnswered).to_string(),
            "Stale action: already answered this round"
        );
    }
}

// ── Core error types ──
//
// One enum per operation, plus the facade's own error that folds them
// together. Transport failures stay wrapped (`lwgate_coap::Error`) so callers
// can still ask `is_timeout()`; response codes outside 2.xx become
// `Rejected` variants carrying the status and whatever payload came back.

use std::time::Duration;

use lwgate_coap::ResponseStatus;
use thiserror::Error;

use crate::gateway::Outcome;

/// Failure of [`Session::register`](crate::Session::register).
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Registration exchange failed: {0}")]
    Transport(#[from] lwgate_coap::Error),

    #[error("Registration rejected by server: {status}")]
    Rejected {
        status: ResponseStatus,
        payload: String,
    },
}

/// Failure of [`Session::execute_command`](crate::Session::execute_command).
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command: {name}")]
    Unknown { name: String },

    #[error("Command exchange failed: {0}")]
    Transport(#[from] lwgate_coap::Error),

    #[error("Command {command} rejected by server: {status}")]
    Rejected {
        command: &'static str,
        status: ResponseStatus,
        payload: String,
    },
}

impl CommandError {
    /// `true` when the caller asked for something the gateway cannot do.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }
}

/// Everything the [`Gateway`](crate::Gateway) can fail with.
#[derive(Debug, Error)]
pub enum GatewayError {
    // ── Request errors ───────────────────────────────────────────────
    #[error("Invalid request body: {reason}")]
    InvalidBody { reason: String },

    #[error("Missing command parameter")]
    MissingCommand,

    // ── Operation errors ─────────────────────────────────────────────
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Operation did not complete within {timeout:?}")]
    DeadlineExceeded { timeout: Duration },
}

impl GatewayError {
    /// Classify for the transport listener.
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::InvalidBody { .. } | Self::MissingCommand => Outcome::ClientError,
            Self::Command(e) if e.is_client_error() => Outcome::ClientError,
            Self::DeadlineExceeded { .. } => Outcome::TimedOut,
            Self::Registration(_) | Self::Command(_) => Outcome::Failure,
        }
    }

    /// Whether the underlying exchange ran out of retransmissions or time.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::DeadlineExceeded { .. } => true,
            Self::Registration(RegistrationError::Transport(e))
            | Self::Command(CommandError::Transport(e)) => e.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_command_is_client_error() {
        let err = GatewayError::from(CommandError::Unknown {
            name: "shutdown".into(),
        });
        assert_eq!(err.outcome(), Outcome::ClientError);
        assert_eq!(err.to_string(), "Unknown command: shutdown");
    }

    #[test]
    fn rejection_is_failure() {
        let err = GatewayError::from(CommandError::Rejected {
            command: "reboot",
            status: ResponseStatus::METHOD_NOT_ALLOWED,
            payload: String::new(),
        });
        assert_eq!(err.outcome(), Outcome::Failure);
        assert!(!err.is_timeout());
    }

    #[test]
    fn missing_command_message() {
        let err = GatewayError::MissingCommand;
        assert_eq!(err.outcome(), Outcome::ClientError);
        assert_eq!(err.to_string(), "Missing command parameter");
    }

    #[test]
    fn deadline_is_timed_out() {
        let err = GatewayError::DeadlineExceeded {
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.outcome(), Outcome::TimedOut);
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Operation did not complete within 5s");
    }

    #[test]
    fn sub_second_deadline_is_shown_in_millis() {
        let err = GatewayError::DeadlineExceeded {
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "Operation did not complete within 250ms");
    }

    #[test]
    fn transport_timeout_is_failure_but_reports_timeout() {
        let err = GatewayError::from(RegistrationError::Transport(
            lwgate_coap::Error::Timeout {
                peer: "127.0.0.1:5683".parse().unwrap(),
                attempts: 5,
            },
        ));
        assert_eq!(err.outcome(), Outcome::Failure);
        assert!(err.is_timeout());
    }
}

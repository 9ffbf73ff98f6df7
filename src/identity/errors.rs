//! Identity provider error types
//!
//! Errors are `Clone` so scripted test clients can hand the same failure out
//! more than once; transport errors are therefore carried as text.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// GoTrue error codes that mean "the token could not be verified yet"
const TRANSIENT_ERROR_CODES: &[&str] = &["bad_jwt"];

/// Fallback for SDK/server versions that do not send a structured `error_code`
static TRANSIENT_MESSAGE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"JWT|\bkid\b|unverifiable").ok());

/// Errors returned by an identity provider client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The provider answered and rejected the request
    #[error("{message}")]
    Api {
        status: u16,
        error_code: Option<String>,
        message: String,
    },

    /// The request never produced a usable HTTP response (DNS, TLS, timeout, ...)
    #[error("identity service request failed: {0}")]
    Transport(String),

    /// The provider answered with a body we could not understand
    #[error("invalid response from identity service: {0}")]
    InvalidResponse(String),

    /// The client could not be built from its configuration
    #[error("identity client misconfigured: {0}")]
    Configuration(String),

    /// An operation that needs a session was attempted without one
    #[error("Auth session missing")]
    SessionMissing,
}

impl IdentityError {
    /// Build an API error from a status code and message
    #[must_use]
    pub fn api(status: u16, error_code: Option<&str>, message: &str) -> Self {
        Self::Api {
            status,
            error_code: error_code.map(ToString::to_string),
            message: message.to_string(),
        }
    }

    /// Whether the provider rejected the request (as opposed to the request failing)
    #[must_use]
    pub fn is_provider_rejection(&self) -> bool {
        matches!(self, Self::Api { .. } | Self::SessionMissing)
    }

    /// Whether this looks like token-signing-key propagation lag rather than a real rejection
    ///
    /// The structured error code is checked first; the message heuristic only
    /// applies to API errors.
    #[must_use]
    pub fn is_transient_verification_failure(&self) -> bool {
        match self {
            Self::Api {
                error_code, message, ..
            } => {
                if error_code
                    .as_deref()
                    .is_some_and(|code| TRANSIENT_ERROR_CODES.contains(&code))
                {
                    return true;
                }
                TRANSIENT_MESSAGE_PATTERN
                    .as_ref()
                    .is_some_and(|pattern| pattern.is_match(message))
            }
            _ => false,
        }
    }
}

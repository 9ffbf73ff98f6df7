//! Failures that can end a callback reconciliation
//!
//! None of these are fatal: each one is turned into the short message shown
//! on the outcome page via [`CallbackError::user_message`].

use std::fmt;
use thiserror::Error;

use crate::callback::outcome::{NOT_CONFIGURED_MESSAGE, UNEXPECTED_ERROR_MESSAGE};
use crate::identity::IdentityError;

/// The identity call a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStage {
    /// Email link carrying a `token_hash`
    OneTimeCode,
    /// Email link carrying an access/refresh token pair
    SessionExchange,
    /// Password reset form submission
    PasswordUpdate,
}

impl VerificationStage {
    const fn expired_link_message(self) -> &'static str {
        match self {
            Self::OneTimeCode => {
                "Email confirmation link is invalid or expired. Please request a new confirmation email."
            }
            Self::SessionExchange => {
                "The confirmation link is invalid or expired. Please request a new confirmation email from the app."
            }
            Self::PasswordUpdate => {
                "Your password reset link is invalid or expired. Please request a new password reset email."
            }
        }
    }
}

impl fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OneTimeCode => "one-time code verification",
            Self::SessionExchange => "session exchange",
            Self::PasswordUpdate => "password update",
        })
    }
}

#[derive(Debug, Error)]
pub enum CallbackError {
    /// The identity service redirected with an `error_description`
    #[error("identity service reported an error: {0}")]
    RedirectCarried(String),

    /// The identity service rejected a code, token pair or password
    #[error("{stage} rejected: {source}")]
    Verification {
        stage: VerificationStage,
        #[source]
        source: IdentityError,
    },

    /// Confirmation could not be corroborated because token signing keys are
    /// still propagating; only recorded as an indeterminate check
    #[error("confirmation check hit token propagation lag: {0}")]
    TransientConfirmationLag(#[source] IdentityError),

    /// The session was established but the email is still unconfirmed
    #[error("email address is unconfirmed after session exchange")]
    ConfirmationFailed,

    #[error("identity service is not configured")]
    ConfigurationMissing,

    /// Transport or decoding failure talking to the identity service
    #[error("unexpected failure during {stage}: {source}")]
    Unexpected {
        stage: VerificationStage,
        #[source]
        source: IdentityError,
    },
}

impl CallbackError {
    /// Classify an identity failure from `stage`
    #[must_use]
    pub fn from_identity(stage: VerificationStage, source: IdentityError) -> Self {
        if source.is_provider_rejection() {
            Self::Verification { stage, source }
        } else {
            Self::Unexpected { stage, source }
        }
    }

    /// Text shown to the user for this failure
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::RedirectCarried(description) => description.clone(),
            Self::Verification { stage, source }
                if source.is_transient_verification_failure()
                    || *source == IdentityError::SessionMissing =>
            {
                stage.expired_link_message().to_string()
            }
            Self::Verification { source, .. } => source.to_string(),
            Self::ConfirmationFailed => {
                "We couldn't confirm your email address. Please try signing up again.".to_string()
            }
            Self::ConfigurationMissing => NOT_CONFIGURED_MESSAGE.to_string(),
            Self::TransientConfirmationLag(_) | Self::Unexpected { .. } => {
                UNEXPECTED_ERROR_MESSAGE.to_string()
            }
        }
    }
}

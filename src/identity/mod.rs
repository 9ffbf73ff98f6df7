//! Identity provider abstraction
//!
//! The reconciler only talks to the hosted identity service through the
//! [`IdentityClient`] trait. [`GoTrueClient`] is the production implementation;
//! tests use the scripted client in `crate::testing::mock`.

pub mod errors;
pub mod gotrue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use errors::IdentityError;
pub use gotrue::GoTrueClient;

/// Shared handle to the process-wide identity client
pub type SharedIdentityClient = Arc<dyn IdentityClient>;

/// Purpose of a one-time code, as understood by the provider's verify endpoint
///
/// Only signup links are verified by code; the other flows arrive with a
/// token pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpType {
    Signup,
}

impl OtpType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "signup",
        }
    }
}

/// A user record as returned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

impl User {
    #[must_use]
    pub fn is_email_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// An authenticated session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Session {
    /// Whether the access token is past its expiry instant
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= Utc::now())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Result of verifying a one-time code
///
/// Depending on the flow the provider returns a full session, just the user,
/// or (rarely) neither.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OtpVerification {
    pub session: Option<Session>,
    pub user: Option<User>,
}

impl OtpVerification {
    /// The user from the session if present, otherwise the bare user
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.session
            .as_ref()
            .and_then(|session| session.user.as_ref())
            .or(self.user.as_ref())
    }
}

/// Operations the callback flow needs from the hosted identity service
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Exchange a one-time token hash for confirmation of `otp_type`
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the hash or cannot be reached
    async fn verify_otp(
        &self,
        token_hash: &str,
        otp_type: OtpType,
    ) -> Result<OtpVerification, IdentityError>;

    /// Establish a session from an access/refresh token pair
    ///
    /// # Errors
    ///
    /// Returns an error if the tokens are rejected or the provider cannot be reached
    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, IdentityError>;

    /// Fetch the user the session belongs to
    ///
    /// # Errors
    ///
    /// Returns an error if the access token is rejected or the provider cannot be reached
    async fn get_user(&self, session: &Session) -> Result<User, IdentityError>;

    /// Trade a refresh token for a new session
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh token is rejected or the provider cannot be reached
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, IdentityError>;

    /// Set a new password for the session's user
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the password or the session
    async fn update_password(&self, session: &Session, password: &str)
        -> Result<User, IdentityError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_debug_redacts_tokens() {
        let session = Session {
            access_token: "secret-access".to_string(),
            refresh_token: "secret-refresh".to_string(),
            expires_at: None,
            user: None,
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
    }

    #[test]
    fn test_session_expiry() {
        let mut session = Session {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: None,
            user: None,
        };
        assert!(!session.is_expired());

        session.expires_at = Some(Utc::now() - Duration::minutes(1));
        assert!(session.is_expired());

        session.expires_at = Some(Utc::now() + Duration::minutes(5));
        assert!(!session.is_expired());
    }

    #[test]
    fn test_verification_prefers_session_user() {
        let session_user = User {
            id: "from-session".to_string(),
            email: None,
            email_confirmed_at: None,
        };
        let verification = OtpVerification {
            session: Some(Session {
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
                expires_at: None,
                user: Some(session_user),
            }),
            user: Some(User {
                id: "bare".to_string(),
                email: None,
                email_confirmed_at: None,
            }),
        };
        assert_eq!(verification.user().map(|u| u.id.as_str()), Some("from-session"));
    }
}

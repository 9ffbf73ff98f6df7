//! Scripted identity client for isolated tests
//!
//! Each operation returns the response it was given with the matching
//! `with_*` builder, as many times as it is called. Unscripted operations
//! fail with [`IdentityError::InvalidResponse`].

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

use crate::identity::{
    IdentityClient, IdentityError, OtpType, OtpVerification, Session, User,
};

/// A call received by [`MockIdentityClient`]; secrets are not recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityCall {
    VerifyOtp {
        token_hash: String,
        otp_type: OtpType,
    },
    SetSession {
        access_token: String,
        refresh_token: String,
    },
    GetUser,
    RefreshSession,
    UpdatePassword,
}

#[derive(Default)]
pub struct MockIdentityClient {
    verify_otp: Option<Result<OtpVerification, IdentityError>>,
    set_session: Option<Result<Session, IdentityError>>,
    get_user: Option<Result<User, IdentityError>>,
    refresh_session: Option<Result<Session, IdentityError>>,
    update_password: Option<Result<User, IdentityError>>,
    calls: Mutex<Vec<IdentityCall>>,
}

impl MockIdentityClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verify_otp(mut self, response: Result<OtpVerification, IdentityError>) -> Self {
        self.verify_otp = Some(response);
        self
    }

    #[must_use]
    pub fn with_set_session(mut self, response: Result<Session, IdentityError>) -> Self {
        self.set_session = Some(response);
        self
    }

    #[must_use]
    pub fn with_get_user(mut self, response: Result<User, IdentityError>) -> Self {
        self.get_user = Some(response);
        self
    }

    #[must_use]
    pub fn with_refresh_session(mut self, response: Result<Session, IdentityError>) -> Self {
        self.refresh_session = Some(response);
        self
    }

    #[must_use]
    pub fn with_update_password(mut self, response: Result<User, IdentityError>) -> Self {
        self.update_password = Some(response);
        self
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<IdentityCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: IdentityCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn scripted<T: Clone>(
        response: Option<&Result<T, IdentityError>>,
        operation: &str,
    ) -> Result<T, IdentityError> {
        response.cloned().unwrap_or_else(|| {
            Err(IdentityError::InvalidResponse(format!(
                "no scripted response for {operation}"
            )))
        })
    }
}

#[async_trait]
impl IdentityClient for MockIdentityClient {
    async fn verify_otp(
        &self,
        token_hash: &str,
        otp_type: OtpType,
    ) -> Result<OtpVerification, IdentityError> {
        self.record(IdentityCall::VerifyOtp {
            token_hash: token_hash.to_string(),
            otp_type,
        });
        Self::scripted(self.verify_otp.as_ref(), "verify_otp")
    }

    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, IdentityError> {
        self.record(IdentityCall::SetSession {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
        });
        Self::scripted(self.set_session.as_ref(), "set_session")
    }

    async fn get_user(&self, _session: &Session) -> Result<User, IdentityError> {
        self.record(IdentityCall::GetUser);
        Self::scripted(self.get_user.as_ref(), "get_user")
    }

    async fn refresh_session(&self, _refresh_token: &str) -> Result<Session, IdentityError> {
        self.record(IdentityCall::RefreshSession);
        Self::scripted(self.refresh_session.as_ref(), "refresh_session")
    }

    async fn update_password(
        &self,
        _session: &Session,
        _password: &str,
    ) -> Result<User, IdentityError> {
        self.record(IdentityCall::UpdatePassword);
        Self::scripted(self.update_password.as_ref(), "update_password")
    }
}

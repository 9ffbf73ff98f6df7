//! GoTrue (Supabase Auth) REST client
//!
//! Every request carries the project's public `apikey`; calls made on behalf
//! of a user add that user's access token as the bearer, otherwise the anon
//! key doubles as the bearer.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use log::debug;
use reqwest::{Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::fmt;
use url::Url;

use super::{IdentityClient, IdentityError, OtpType, OtpVerification, Session, User};
use crate::settings::IdentitySettings;
use crate::utils::crypto::jwt_expiry;

/// Path prefix of the auth API on a Supabase project
const AUTH_API_PATH: &str = "/auth/v1";

#[derive(Clone)]
pub struct GoTrueClient {
    auth_url: String,
    anon_key: String,
    http_client: reqwest::Client,
}

impl fmt::Debug for GoTrueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoTrueClient")
            .field("auth_url", &self.auth_url)
            .finish_non_exhaustive()
    }
}

/// Token grant as returned by `/verify` and `/token`
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<User>,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .or_else(|| {
                self.expires_in
                    .and_then(Duration::try_seconds)
                    .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            });
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// The several error body shapes GoTrue has used across versions
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl GoTrueClient {
    /// Create a client for the Supabase project at `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Configuration`] if the URL is not an absolute
    /// http(s) URL or the HTTP client cannot be built
    pub fn new(
        base_url: &str,
        anon_key: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, IdentityError> {
        let base_url = base_url.trim();
        let parsed = Url::parse(base_url)
            .map_err(|e| IdentityError::Configuration(format!("invalid service URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(IdentityError::Configuration(format!(
                "unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Configuration(e.to_string()))?;

        Ok(Self {
            auth_url: format!("{}{AUTH_API_PATH}", base_url.trim_end_matches('/')),
            anon_key: anon_key.trim().to_string(),
            http_client,
        })
    }

    /// Build a client from settings, or `None` when the service is not configured
    ///
    /// # Errors
    ///
    /// Returns an error if settings are present but unusable
    pub fn from_settings(settings: &IdentitySettings) -> Result<Option<Self>, IdentityError> {
        if !settings.is_configured() {
            return Ok(None);
        }
        Self::new(
            &settings.url,
            &settings.anon_key,
            std::time::Duration::from_secs(settings.request_timeout_secs),
        )
        .map(Some)
    }

    #[must_use]
    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{path}", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, IdentityError> {
        let response = request
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(parse_error_body(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| IdentityError::InvalidResponse(e.to_string()))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<User, IdentityError> {
        self.send(self.request(Method::GET, "/user", Some(access_token)))
            .await
    }
}

/// Map a non-2xx response body onto [`IdentityError::Api`]
fn parse_error_body(status: u16, body: &str) -> IdentityError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    let error_code = parsed.error_code.or_else(|| match parsed.code {
        Some(Value::String(code)) => Some(code),
        _ => None,
    });
    let message = parsed
        .msg
        .or(parsed.message)
        .or(parsed.error_description)
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("Request failed with status {status}"));

    IdentityError::Api {
        status,
        error_code,
        message,
    }
}

#[async_trait]
impl IdentityClient for GoTrueClient {
    async fn verify_otp(
        &self,
        token_hash: &str,
        otp_type: OtpType,
    ) -> Result<OtpVerification, IdentityError> {
        debug!("Verifying one-time code of type {}", otp_type.as_str());
        let body: Value = self
            .send(
                self.request(Method::POST, "/verify", None)
                    .json(&json!({ "type": otp_type.as_str(), "token_hash": token_hash })),
            )
            .await?;

        if body.get("access_token").is_some() {
            let session = serde_json::from_value::<TokenResponse>(body)
                .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?
                .into_session();
            return Ok(OtpVerification {
                user: session.user.clone(),
                session: Some(session),
            });
        }

        if body.get("id").is_some() {
            let user = serde_json::from_value::<User>(body)
                .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;
            return Ok(OtpVerification {
                session: None,
                user: Some(user),
            });
        }

        Ok(OtpVerification::default())
    }

    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, IdentityError> {
        let expires_at: Option<DateTime<Utc>> = jwt_expiry(access_token);

        if expires_at.is_some_and(|exp| exp <= Utc::now()) {
            debug!("Access token already expired, refreshing session");
            return self.refresh_session(refresh_token).await;
        }

        let user = self.fetch_user(access_token).await?;
        Ok(Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at,
            user: Some(user),
        })
    }

    async fn get_user(&self, session: &Session) -> Result<User, IdentityError> {
        self.fetch_user(&session.access_token).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        if refresh_token.is_empty() {
            return Err(IdentityError::SessionMissing);
        }
        let token: TokenResponse = self
            .send(
                self.request(Method::POST, "/token?grant_type=refresh_token", None)
                    .json(&json!({ "refresh_token": refresh_token })),
            )
            .await?;
        Ok(token.into_session())
    }

    async fn update_password(
        &self,
        session: &Session,
        password: &str,
    ) -> Result<User, IdentityError> {
        self.send(
            self.request(Method::PUT, "/user", Some(&session.access_token))
                .json(&json!({ "password": password })),
        )
        .await
    }
}

use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    HttpRequest,
};
use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Session;
use crate::settings::NedilSettings;
use crate::utils::crypto::{decrypt_data, derive_encryption_key, encrypt_data};
use crate::utils::logging::LoggingHelper;

/// Cookie carrying the recovery session from the callback to the password form
pub const RECOVERY_COOKIE_NAME: &str = "nedilai_recovery";

/// Only the callback routes ever need the recovery cookie
pub const RECOVERY_COOKIE_PATH: &str = "/auth/callback";

/// Upper bound on the recovery session lifetime (one day)
pub const MAX_RECOVERY_SESSION_MINUTES: u64 = 24 * 60;

/// Options for cookie creation
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age: CookieDuration,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            secure: true,
            same_site: SameSite::Strict,
            path: RECOVERY_COOKIE_PATH.to_string(),
            max_age: CookieDuration::minutes(15),
        }
    }
}

/// Encrypted cookie payload
#[derive(Serialize, Deserialize)]
struct RecoveryCookie {
    session: Session,
    issued_at: DateTime<Utc>,
}

/// Cookie factory for the encrypted recovery session cookie
#[derive(Clone)]
pub struct CookieFactory {
    encryption_key: [u8; 32],
    cookie_secure: bool,
    recovery_session_minutes: u64,
}

impl CookieFactory {
    /// Lifetimes above [`MAX_RECOVERY_SESSION_MINUTES`] are capped
    #[must_use]
    pub fn new(encryption_key: [u8; 32], cookie_secure: bool, recovery_session_minutes: u64) -> Self {
        Self {
            encryption_key,
            cookie_secure,
            recovery_session_minutes: recovery_session_minutes.min(MAX_RECOVERY_SESSION_MINUTES),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &NedilSettings) -> Self {
        Self::new(
            derive_encryption_key(settings.session.session_secret.as_bytes()),
            settings.cookies.secure,
            settings.session.recovery_session_minutes,
        )
    }

    fn lifetime_minutes(&self) -> i64 {
        i64::try_from(self.recovery_session_minutes).unwrap_or(0)
    }

    /// Generic method to create a cookie with encrypted data
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_cookie<T: Serialize>(
        &self,
        name: &str,
        data: &T,
        options: CookieOptions,
    ) -> Result<Cookie<'static>> {
        let value = encrypt_data(data, &self.encryption_key)?;

        Ok(Cookie::build(name.to_owned(), value)
            .http_only(options.http_only)
            .secure(self.cookie_secure && options.secure)
            .same_site(options.same_site)
            .path(options.path)
            .max_age(options.max_age)
            .finish())
    }

    /// Create the encrypted recovery session cookie
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_recovery_cookie(&self, session: &Session) -> Result<Cookie<'static>> {
        let payload = RecoveryCookie {
            session: session.clone(),
            issued_at: Utc::now(),
        };
        self.create_cookie(
            RECOVERY_COOKIE_NAME,
            &payload,
            CookieOptions {
                max_age: CookieDuration::minutes(self.lifetime_minutes()),
                ..Default::default()
            },
        )
    }

    /// Create an expired cookie to clear the recovery session
    #[must_use]
    pub fn create_expired_recovery_cookie(&self) -> Cookie<'static> {
        create_expired_cookie(RECOVERY_COOKIE_NAME, self.cookie_secure)
    }

    /// Recovery session from request cookies
    ///
    /// Missing, undecryptable and stale cookies all yield `None`.
    #[must_use]
    pub fn recovery_session_from_request(&self, req: &HttpRequest) -> Option<Session> {
        let cookie = req.cookie(RECOVERY_COOKIE_NAME)?;
        if cookie.value().is_empty() {
            return None;
        }

        let payload = match decrypt_data::<RecoveryCookie>(cookie.value(), &self.encryption_key) {
            Ok(payload) => payload,
            Err(e) => {
                LoggingHelper::log_recovery_session_rejected(&e.to_string());
                return None;
            }
        };

        let Some(lifetime) = TimeDelta::try_minutes(self.lifetime_minutes()) else {
            LoggingHelper::log_recovery_session_rejected("recovery session lifetime out of range");
            return None;
        };
        if Utc::now() - payload.issued_at > lifetime {
            LoggingHelper::log_recovery_session_rejected("cookie older than its lifetime");
            return None;
        }

        Some(payload.session)
    }
}

/// Create an expired cookie to clear a specific cookie
#[must_use]
pub fn create_expired_cookie(name: &str, secure: bool) -> Cookie<'static> {
    Cookie::build(name.to_owned(), "")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path(RECOVERY_COOKIE_PATH)
        .max_age(CookieDuration::seconds(-1))
        .finish()
}

//! Test fixtures providing pre-built test objects

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use std::sync::OnceLock;

use crate::identity::{OtpVerification, Session, User};
use crate::session::CookieFactory;
use crate::settings::{
    CookieSettings, IdentitySettings, NedilSettings, ReconcilerSettings, SessionSettings,
};

use super::constants::{
    TEST_ACCESS_TOKEN, TEST_ANON_KEY, TEST_EMAIL, TEST_IDENTITY_URL, TEST_REFRESH_TOKEN,
    TEST_SESSION_KEY, TEST_USER_ID,
};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Reconciler settings without the settle pauses
    #[must_use]
    pub fn reconciler_settings() -> ReconcilerSettings {
        ReconcilerSettings {
            otp_settle_delay_ms: 0,
            session_settle_delay_ms: 0,
            min_password_length: 6,
        }
    }

    /// Create standard test settings
    #[must_use]
    pub fn settings() -> NedilSettings {
        NedilSettings {
            identity: IdentitySettings {
                url: TEST_IDENTITY_URL.to_string(),
                anon_key: TEST_ANON_KEY.to_string(),
                request_timeout_secs: 5,
            },
            reconciler: Self::reconciler_settings(),
            session: SessionSettings {
                session_secret: Self::consistent_test_secret().to_string(),
                recovery_session_minutes: 15,
            },
            cookies: CookieSettings {
                secure: false, // Set to false for testing
            },
            ..Default::default()
        }
    }

    /// Cookie factory keyed with the consistent test secret
    #[must_use]
    pub fn cookie_factory() -> CookieFactory {
        CookieFactory::from_settings(&Self::settings())
    }

    #[must_use]
    pub fn user(email_confirmed: bool) -> User {
        User {
            id: TEST_USER_ID.to_string(),
            email: Some(TEST_EMAIL.to_string()),
            email_confirmed_at: email_confirmed.then(|| Utc::now() - Duration::minutes(1)),
        }
    }

    /// A live session that expires in an hour
    #[must_use]
    pub fn session(email_confirmed: bool) -> Session {
        Session {
            access_token: TEST_ACCESS_TOKEN.to_string(),
            refresh_token: TEST_REFRESH_TOKEN.to_string(),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            user: Some(Self::user(email_confirmed)),
        }
    }

    /// Create an expired session for testing refresh logic
    #[must_use]
    pub fn expired_session() -> Session {
        let mut session = Self::session(true);
        session.expires_at = Some(Utc::now() - Duration::minutes(5));
        session
    }

    /// One-time code verification that returned a full session
    #[must_use]
    pub fn verification_with_session(email_confirmed: bool) -> OtpVerification {
        let session = Self::session(email_confirmed);
        OtpVerification {
            user: session.user.clone(),
            session: Some(session),
        }
    }

    /// Unsigned JWT whose only claims are a subject and `exp`
    #[must_use]
    pub fn jwt_with_expiry(expires_at: DateTime<Utc>) -> String {
        let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = serde_json::json!({ "sub": TEST_USER_ID, "exp": expires_at.timestamp() });
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.test-signature")
    }
}

/// Thread-safe static test secret for consistent testing
static TEST_SECRET: OnceLock<String> = OnceLock::new();

impl TestFixtures {
    /// Get a consistent test secret across all tests
    pub fn consistent_test_secret() -> &'static str {
        TEST_SECRET.get_or_init(|| general_purpose::STANDARD.encode(TEST_SESSION_KEY))
    }
}

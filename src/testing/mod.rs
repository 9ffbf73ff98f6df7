//! Testing utilities for the callback service
//!
//! - [`fixtures`] - Pre-built users, sessions, settings and tokens
//! - [`mock`] - A scripted [`IdentityClient`](crate::identity::IdentityClient)
//!   that records every call it receives
//!
//! ## Usage
//!
//! ```rust
//! use nedilai_callback::testing::{mock::MockIdentityClient, TestFixtures};
//!
//! let client = MockIdentityClient::new()
//!     .with_set_session(Ok(TestFixtures::session(true)))
//!     .with_get_user(Ok(TestFixtures::user(true)));
//! assert!(client.calls().is_empty());
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::TestFixtures;
pub use mock::{IdentityCall, MockIdentityClient};

/// Common test constants
pub mod constants {
    /// Default test email address
    pub const TEST_EMAIL: &str = "test@example.com";

    /// Default test user id
    pub const TEST_USER_ID: &str = "5f1c9a52-7d0e-4b8e-8f4a-2c1d3e4f5a6b";

    /// Public API key used against mocked identity services
    pub const TEST_ANON_KEY: &str = "test-anon-key";

    /// Identity service URL used in test settings
    pub const TEST_IDENTITY_URL: &str = "https://test-project.supabase.co";

    /// Access and refresh tokens handed out by fixture sessions
    pub const TEST_ACCESS_TOKEN: &str = "test-access-token";
    pub const TEST_REFRESH_TOKEN: &str = "test-refresh-token";

    /// Test session secret (256 bits)
    pub const TEST_SESSION_KEY: &[u8] = b"test_key_32_bytes_long_for_test_";
}

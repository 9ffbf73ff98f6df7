//! Recovery session handling
//!
//! A recovery link establishes a session on the callback request, but the
//! password is submitted in a later request. The session travels between the
//! two in an encrypted, HTTP-only cookie built by [`CookieFactory`].

pub mod cookie;

pub use cookie::{CookieFactory, CookieOptions, RECOVERY_COOKIE_NAME, RECOVERY_COOKIE_PATH};

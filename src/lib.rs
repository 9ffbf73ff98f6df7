#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the callback service
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod callback;
pub mod errors;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod session;
pub mod settings;
pub mod utils;

// Make test utilities available for both unit tests and integration tests
#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use callback::{CallbackParameters, CallbackReconciler, FlowType, ReconciliationOutcome};
pub use errors::CallbackError;
pub use handlers::{configure_services, CallbackState};
pub use identity::{GoTrueClient, IdentityClient, IdentityError, SharedIdentityClient};
pub use settings::NedilSettings;

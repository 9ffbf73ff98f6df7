// Centralized logging for callback events; token values never reach the log
use log::{debug, info, warn};

use crate::callback::{CallbackParameters, FlowType, ReconciliationOutcome, SessionConfirmationStatus};
use crate::errors::CallbackError;
use crate::identity::IdentityError;

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log identity client initialization status
    pub fn log_identity_init(auth_url: Option<&str>) {
        match auth_url {
            Some(url) => info!("✅ Identity service configured ({url})"),
            None => warn!(
                "❌ Identity service not configured - set SUPABASE_URL and SUPABASE_ANON_KEY"
            ),
        }
    }

    /// Log identity client construction failure; the service keeps running unconfigured
    pub fn log_identity_init_failed(error: &IdentityError) {
        warn!("❌ Identity service configuration rejected: {error}");
    }

    /// Log a callback submission with a redacted parameter summary
    pub fn log_callback_received(params: &CallbackParameters) {
        debug!("Auth callback received: {params:?}");
    }

    /// Log the outcome a callback or password submission ended in
    pub fn log_outcome(flow: FlowType, outcome: &ReconciliationOutcome) {
        match outcome {
            ReconciliationOutcome::Error(message) => {
                info!("🔍 Callback for flow '{flow}' ended in error: {message}");
            }
            _ => info!("🔍 Callback for flow '{flow}' ended in {}", outcome.kind()),
        }
    }

    /// Log the failure behind an error outcome
    pub fn log_callback_failure(error: &CallbackError) {
        match error {
            CallbackError::RedirectCarried(_) => debug!("Callback carried an error: {error}"),
            CallbackError::Unexpected { .. } => warn!("Callback failed unexpectedly: {error}"),
            _ => info!("Callback rejected: {error}"),
        }
    }

    /// Log the advisory confirmation check after a signup link
    pub fn log_corroboration(flow: FlowType, status: &SessionConfirmationStatus) {
        match status {
            SessionConfirmationStatus::Confirmed => {
                debug!("Email confirmation corroborated for flow '{flow}'");
            }
            SessionConfirmationStatus::NotConfirmed => {
                warn!("Identity service reports email unconfirmed for flow '{flow}'");
            }
            SessionConfirmationStatus::Indeterminate(reason) => {
                info!("Email confirmation for flow '{flow}' could not be corroborated: {reason}");
            }
        }
    }

    /// Log the outcome of a password update request
    pub fn log_password_update(result: Result<(), &CallbackError>) {
        match result {
            Ok(()) => info!("✅ Password updated through recovery flow"),
            Err(error) => info!("Password update rejected: {error}"),
        }
    }

    /// Log a recovery session cookie that could not be used
    pub fn log_recovery_session_rejected(reason: &str) {
        debug!("Ignoring recovery session cookie: {reason}");
    }
}

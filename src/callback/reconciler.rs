//! The callback state machine
//!
//! One call to [`CallbackReconciler::reconcile`] turns the parameters of a
//! single redirect into exactly one [`ReconciliationOutcome`]. Identity
//! failures never escape: every path ends in a renderable outcome.
//!
//! Two fixed pauses exist because the identity service can take a moment to
//! make a fresh confirmation visible to follow-up reads. They are single
//! waits, never retry loops.

use std::time::Duration;

use super::outcome::{ReconciliationOutcome, SessionConfirmationStatus, NOT_CONFIGURED_MESSAGE};
use super::params::{CallbackParameters, FlowType};
use crate::errors::{CallbackError, VerificationStage};
use crate::identity::{IdentityClient, OtpType, Session, User};
use crate::settings::ReconcilerSettings;
use crate::utils::logging::LoggingHelper;

/// An outcome together with the session established on the way, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub outcome: ReconciliationOutcome,
    pub session: Option<Session>,
}

impl Reconciliation {
    fn new(outcome: ReconciliationOutcome, session: Option<Session>) -> Self {
        Self { outcome, session }
    }

    fn success(flow: FlowType, session: Option<Session>) -> Self {
        Self::new(ReconciliationOutcome::Success(flow), session)
    }

    fn form_error(message: String, session: Option<Session>) -> Self {
        Self::new(
            ReconciliationOutcome::ShowRecoveryForm {
                form_error: Some(message),
            },
            session,
        )
    }
}

pub struct CallbackReconciler<'a> {
    client: Option<&'a dyn IdentityClient>,
    settings: &'a ReconcilerSettings,
}

impl<'a> CallbackReconciler<'a> {
    #[must_use]
    pub fn new(client: Option<&'a dyn IdentityClient>, settings: &'a ReconcilerSettings) -> Self {
        Self { client, settings }
    }

    /// Run one reconciliation for a callback redirect
    pub async fn reconcile(&self, params: &CallbackParameters) -> Reconciliation {
        LoggingHelper::log_callback_received(params);

        let reconciliation = match self.run(params).await {
            Ok(reconciliation) => reconciliation,
            Err(error) => {
                LoggingHelper::log_callback_failure(&error);
                Reconciliation::new(ReconciliationOutcome::Error(error.user_message()), None)
            }
        };

        LoggingHelper::log_outcome(params.flow(), &reconciliation.outcome);
        reconciliation
    }

    async fn run(&self, params: &CallbackParameters) -> Result<Reconciliation, CallbackError> {
        if let Some(description) = params.decoded_error_description() {
            return Err(CallbackError::RedirectCarried(description));
        }

        let client = self.client.ok_or(CallbackError::ConfigurationMissing)?;
        let flow = params.flow();

        if flow == FlowType::Signup {
            if let Some(token_hash) = params.token_hash.as_deref() {
                return self.confirm_signup_code(client, token_hash).await;
            }
        }

        let mut session = None;
        if let (Some(access_token), Some(refresh_token)) =
            (params.access_token.as_deref(), params.refresh_token.as_deref())
        {
            let established = client
                .set_session(access_token, refresh_token)
                .await
                .map_err(|e| CallbackError::from_identity(VerificationStage::SessionExchange, e))?;

            match flow {
                FlowType::Signup => return self.corroborate_signup_session(client, established).await,
                FlowType::EmailChange | FlowType::Magiclink => {
                    return Ok(Reconciliation::success(flow, Some(established)));
                }
                FlowType::Recovery | FlowType::Unknown => session = Some(established),
            }
        }

        let outcome = match flow {
            FlowType::Recovery => ReconciliationOutcome::ShowRecoveryForm { form_error: None },
            FlowType::EmailChange | FlowType::Magiclink => ReconciliationOutcome::Success(flow),
            FlowType::Signup | FlowType::Unknown if params.access_token.is_some() => {
                ReconciliationOutcome::Success(flow)
            }
            FlowType::Signup | FlowType::Unknown => ReconciliationOutcome::Unresolved,
        };
        Ok(Reconciliation::new(outcome, session))
    }

    /// Signup link carrying a `token_hash`
    ///
    /// A successful verification is authoritative; the follow-up check is
    /// only logged.
    async fn confirm_signup_code(
        &self,
        client: &dyn IdentityClient,
        token_hash: &str,
    ) -> Result<Reconciliation, CallbackError> {
        let verification = client
            .verify_otp(token_hash, OtpType::Signup)
            .await
            .map_err(|e| CallbackError::from_identity(VerificationStage::OneTimeCode, e))?;

        settle(self.settings.otp_settle_delay_ms).await;

        let status = match verification.session.as_ref() {
            Some(session) => confirmation_status(client, session).await,
            None => verification.user().map_or_else(
                || SessionConfirmationStatus::Indeterminate("no user returned".to_string()),
                status_of,
            ),
        };
        LoggingHelper::log_corroboration(FlowType::Signup, &status);

        Ok(Reconciliation::success(FlowType::Signup, verification.session))
    }

    /// Signup link carrying a token pair; only a clean "unconfirmed" answer fails
    async fn corroborate_signup_session(
        &self,
        client: &dyn IdentityClient,
        session: Session,
    ) -> Result<Reconciliation, CallbackError> {
        settle(self.settings.session_settle_delay_ms).await;

        let status = confirmation_status(client, &session).await;
        LoggingHelper::log_corroboration(FlowType::Signup, &status);

        match status {
            SessionConfirmationStatus::NotConfirmed => Err(CallbackError::ConfirmationFailed),
            SessionConfirmationStatus::Confirmed | SessionConfirmationStatus::Indeterminate(_) => {
                Ok(Reconciliation::success(FlowType::Signup, Some(session)))
            }
        }
    }

    /// Password reset form submission
    ///
    /// Validation runs before any identity call. On failure the form is shown
    /// again with an error and the (possibly refreshed) session is handed back.
    pub async fn update_password(
        &self,
        session: Option<&Session>,
        password: &str,
        confirmation: &str,
    ) -> Reconciliation {
        if let Some(message) = self.validate_password(password, confirmation) {
            return Reconciliation::form_error(message, session.cloned());
        }

        let Some(client) = self.client else {
            return Reconciliation::form_error(NOT_CONFIGURED_MESSAGE.to_string(), session.cloned());
        };

        let reconciliation = match self.apply_password(client, session, password).await {
            Ok(()) => {
                LoggingHelper::log_password_update(Ok(()));
                Reconciliation::success(FlowType::Recovery, None)
            }
            Err((error, session)) => {
                LoggingHelper::log_password_update(Err(&error));
                Reconciliation::form_error(error.user_message(), session)
            }
        };

        LoggingHelper::log_outcome(FlowType::Recovery, &reconciliation.outcome);
        reconciliation
    }

    /// Local form checks; `Some` is the form error to show
    #[must_use]
    pub fn validate_password(&self, password: &str, confirmation: &str) -> Option<String> {
        let min_length = self.settings.min_password_length;
        if password.chars().count() < min_length {
            return Some(format!(
                "Password must be at least {min_length} characters long."
            ));
        }
        if password != confirmation {
            return Some("Passwords do not match.".to_string());
        }
        None
    }

    async fn apply_password(
        &self,
        client: &dyn IdentityClient,
        session: Option<&Session>,
        password: &str,
    ) -> Result<(), (CallbackError, Option<Session>)> {
        let stage = VerificationStage::PasswordUpdate;
        let Some(session) = session else {
            return Err((
                CallbackError::from_identity(stage, crate::identity::IdentityError::SessionMissing),
                None,
            ));
        };

        let session = if session.is_expired() {
            client
                .refresh_session(&session.refresh_token)
                .await
                .map_err(|e| (CallbackError::from_identity(stage, e), Some(session.clone())))?
        } else {
            session.clone()
        };

        client
            .update_password(&session, password)
            .await
            .map(|_| ())
            .map_err(|e| (CallbackError::from_identity(stage, e), Some(session)))
    }
}

/// Ask the identity service whether the session's email is confirmed
///
/// Any failure of the check itself is `Indeterminate`.
pub async fn confirmation_status(
    client: &dyn IdentityClient,
    session: &Session,
) -> SessionConfirmationStatus {
    match client.get_user(session).await {
        Ok(user) => status_of(&user),
        Err(error) if error.is_transient_verification_failure() => {
            SessionConfirmationStatus::Indeterminate(
                CallbackError::TransientConfirmationLag(error).to_string(),
            )
        }
        Err(error) => SessionConfirmationStatus::Indeterminate(error.to_string()),
    }
}

fn status_of(user: &User) -> SessionConfirmationStatus {
    if user.is_email_confirmed() {
        SessionConfirmationStatus::Confirmed
    } else {
        SessionConfirmationStatus::NotConfirmed
    }
}

async fn settle(delay_ms: u64) {
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityError;
    use crate::testing::mock::{IdentityCall, MockIdentityClient};
    use crate::testing::TestFixtures;

    fn params(fragment: &str) -> CallbackParameters {
        CallbackParameters::from_parts(fragment, "")
    }

    async fn reconcile_with(client: &MockIdentityClient, fragment: &str) -> ReconciliationOutcome {
        let settings = TestFixtures::reconciler_settings();
        CallbackReconciler::new(Some(client), &settings)
            .reconcile(&params(fragment))
            .await
            .outcome
    }

    #[tokio::test]
    async fn test_error_description_short_circuits() {
        let client = MockIdentityClient::new();
        let outcome = reconcile_with(
            &client,
            "error_description=access_denied&type=signup&token_hash=abc&access_token=a&refresh_token=r",
        )
        .await;

        assert_eq!(outcome, ReconciliationOutcome::Error("access_denied".to_string()));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_client_is_not_configured() {
        let settings = TestFixtures::reconciler_settings();
        let outcome = CallbackReconciler::new(None, &settings)
            .reconcile(&params("type=signup&token_hash=abc"))
            .await
            .outcome;
        assert_eq!(
            outcome,
            ReconciliationOutcome::Error("Authentication service is not configured.".to_string())
        );
    }

    #[tokio::test]
    async fn test_error_description_wins_even_without_client() {
        let settings = TestFixtures::reconciler_settings();
        let outcome = CallbackReconciler::new(None, &settings)
            .reconcile(&params("error_description=Email+link+expired"))
            .await
            .outcome;
        assert_eq!(outcome, ReconciliationOutcome::Error("Email link expired".to_string()));
    }

    #[tokio::test]
    async fn test_signup_code_success_ignores_transient_corroboration_failure() {
        let client = MockIdentityClient::new()
            .with_verify_otp(Ok(TestFixtures::verification_with_session(false)))
            .with_get_user(Err(IdentityError::api(401, None, "invalid JWT: unable to verify kid")));

        let outcome = reconcile_with(&client, "type=signup&token_hash=pkce_1").await;

        assert_eq!(outcome, ReconciliationOutcome::Success(FlowType::Signup));
        assert_eq!(
            client.calls(),
            vec![
                IdentityCall::VerifyOtp {
                    token_hash: "pkce_1".to_string(),
                    otp_type: OtpType::Signup
                },
                IdentityCall::GetUser,
            ]
        );
    }

    #[tokio::test]
    async fn test_signup_code_success_with_unconfirmed_user_is_still_success() {
        let client = MockIdentityClient::new().with_verify_otp(Ok(crate::identity::OtpVerification {
            session: None,
            user: Some(TestFixtures::user(false)),
        }));

        let outcome = reconcile_with(&client, "type=signup&token_hash=pkce_1").await;
        assert_eq!(outcome, ReconciliationOutcome::Success(FlowType::Signup));
        // No session to query with
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_signup_code_transient_rejection() {
        let client = MockIdentityClient::new()
            .with_verify_otp(Err(IdentityError::api(401, Some("bad_jwt"), "token rejected")));

        let outcome = reconcile_with(&client, "type=signup&token_hash=pkce_1").await;
        assert_eq!(
            outcome,
            ReconciliationOutcome::Error(
                "Email confirmation link is invalid or expired. Please request a new confirmation email."
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_signup_code_plain_rejection_shows_provider_message() {
        let client = MockIdentityClient::new().with_verify_otp(Err(IdentityError::api(
            403,
            Some("otp_expired"),
            "Email link is invalid or has expired",
        )));

        let outcome = reconcile_with(&client, "type=signup&token_hash=pkce_1").await;
        assert_eq!(
            outcome,
            ReconciliationOutcome::Error("Email link is invalid or has expired".to_string())
        );
    }

    #[tokio::test]
    async fn test_signup_code_transport_failure_is_unexpected() {
        let client = MockIdentityClient::new()
            .with_verify_otp(Err(IdentityError::Transport("timed out".to_string())));

        let outcome = reconcile_with(&client, "type=signup&token_hash=pkce_1").await;
        assert_eq!(
            outcome,
            ReconciliationOutcome::Error("An unexpected error occurred. Please try again.".to_string())
        );
    }

    #[tokio::test]
    async fn test_signup_session_confirmed() {
        let client = MockIdentityClient::new()
            .with_set_session(Ok(TestFixtures::session(true)))
            .with_get_user(Ok(TestFixtures::user(true)));

        let outcome =
            reconcile_with(&client, "type=signup&access_token=a&refresh_token=r").await;
        assert_eq!(outcome, ReconciliationOutcome::Success(FlowType::Signup));
    }

    #[tokio::test]
    async fn test_signup_session_cleanly_unconfirmed_is_error() {
        let client = MockIdentityClient::new()
            .with_set_session(Ok(TestFixtures::session(false)))
            .with_get_user(Ok(TestFixtures::user(false)));

        let outcome =
            reconcile_with(&client, "type=signup&access_token=a&refresh_token=r").await;
        assert_eq!(
            outcome,
            ReconciliationOutcome::Error(
                "We couldn't confirm your email address. Please try signing up again.".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_signup_session_indeterminate_check_is_success() {
        let client = MockIdentityClient::new()
            .with_set_session(Ok(TestFixtures::session(true)))
            .with_get_user(Err(IdentityError::Transport("reset by peer".to_string())));

        let outcome =
            reconcile_with(&client, "type=signup&access_token=a&refresh_token=r").await;
        assert_eq!(outcome, ReconciliationOutcome::Success(FlowType::Signup));
    }

    #[tokio::test]
    async fn test_set_session_transient_failure() {
        let client = MockIdentityClient::new().with_set_session(Err(IdentityError::api(
            403,
            None,
            "token is unverifiable: error while executing keyfunc",
        )));

        let outcome =
            reconcile_with(&client, "type=signup&access_token=a&refresh_token=r").await;
        assert_eq!(
            outcome,
            ReconciliationOutcome::Error(
                "The confirmation link is invalid or expired. Please request a new confirmation email from the app."
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_email_change_with_tokens() {
        let client = MockIdentityClient::new().with_set_session(Ok(TestFixtures::session(true)));

        let outcome =
            reconcile_with(&client, "type=email_change&access_token=a&refresh_token=r").await;
        assert_eq!(outcome, ReconciliationOutcome::Success(FlowType::EmailChange));
        assert_eq!(
            client.calls(),
            vec![IdentityCall::SetSession {
                access_token: "a".to_string(),
                refresh_token: "r".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_magiclink_without_tokens() {
        let client = MockIdentityClient::new();
        let outcome = reconcile_with(&client, "type=magiclink").await;
        assert_eq!(outcome, ReconciliationOutcome::Success(FlowType::Magiclink));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_recovery_without_tokens_shows_form() {
        let client = MockIdentityClient::new();
        let reconciliation = CallbackReconciler::new(Some(&client), &TestFixtures::reconciler_settings())
            .reconcile(&params("type=recovery"))
            .await;
        assert_eq!(
            reconciliation.outcome,
            ReconciliationOutcome::ShowRecoveryForm { form_error: None }
        );
        assert!(reconciliation.session.is_none());
    }

    #[tokio::test]
    async fn test_recovery_with_tokens_keeps_session() {
        let client = MockIdentityClient::new().with_set_session(Ok(TestFixtures::session(true)));
        let reconciliation = CallbackReconciler::new(Some(&client), &TestFixtures::reconciler_settings())
            .reconcile(&params("type=recovery&access_token=a&refresh_token=r"))
            .await;
        assert_eq!(
            reconciliation.outcome,
            ReconciliationOutcome::ShowRecoveryForm { form_error: None }
        );
        assert!(reconciliation.session.is_some());
    }

    #[tokio::test]
    async fn test_unknown_flow_with_access_token_only() {
        let client = MockIdentityClient::new();
        let outcome = reconcile_with(&client, "access_token=a").await;
        assert_eq!(outcome, ReconciliationOutcome::Success(FlowType::Unknown));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_recognised_is_unresolved() {
        let client = MockIdentityClient::new();
        let outcome = reconcile_with(&client, "foo=bar").await;
        assert_eq!(outcome, ReconciliationOutcome::Unresolved);
    }

    #[tokio::test]
    async fn test_short_password_never_calls_identity() {
        let client = MockIdentityClient::new();
        let settings = TestFixtures::reconciler_settings();
        let session = TestFixtures::session(true);
        let reconciliation = CallbackReconciler::new(Some(&client), &settings)
            .update_password(Some(&session), "12345", "12345")
            .await;

        assert_eq!(
            reconciliation.outcome,
            ReconciliationOutcome::ShowRecoveryForm {
                form_error: Some("Password must be at least 6 characters long.".to_string())
            }
        );
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_password_length_counts_characters() {
        let settings = TestFixtures::reconciler_settings();
        let reconciler = CallbackReconciler::new(None, &settings);
        // Five characters, ten bytes
        assert!(reconciler.validate_password("ééééé", "ééééé").is_some());
        assert!(reconciler.validate_password("éééééé", "éééééé").is_none());
    }

    #[tokio::test]
    async fn test_mismatched_password_never_calls_identity() {
        let client = MockIdentityClient::new();
        let settings = TestFixtures::reconciler_settings();
        let session = TestFixtures::session(true);
        let reconciliation = CallbackReconciler::new(Some(&client), &settings)
            .update_password(Some(&session), "hunter22", "hunter23")
            .await;

        assert_eq!(
            reconciliation.outcome,
            ReconciliationOutcome::ShowRecoveryForm {
                form_error: Some("Passwords do not match.".to_string())
            }
        );
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_password_update_success() {
        let client = MockIdentityClient::new().with_update_password(Ok(TestFixtures::user(true)));
        let settings = TestFixtures::reconciler_settings();
        let session = TestFixtures::session(true);
        let reconciliation = CallbackReconciler::new(Some(&client), &settings)
            .update_password(Some(&session), "hunter22", "hunter22")
            .await;

        assert_eq!(
            reconciliation.outcome,
            ReconciliationOutcome::Success(FlowType::Recovery)
        );
        assert!(reconciliation.session.is_none());
        assert_eq!(client.calls(), vec![IdentityCall::UpdatePassword]);
    }

    #[tokio::test]
    async fn test_password_update_without_session() {
        let client = MockIdentityClient::new();
        let settings = TestFixtures::reconciler_settings();
        let reconciliation = CallbackReconciler::new(Some(&client), &settings)
            .update_password(None, "hunter22", "hunter22")
            .await;

        match reconciliation.outcome {
            ReconciliationOutcome::ShowRecoveryForm {
                form_error: Some(message),
            } => assert!(message.contains("request a new password reset email")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed_first() {
        let client = MockIdentityClient::new()
            .with_refresh_session(Ok(TestFixtures::session(true)))
            .with_update_password(Ok(TestFixtures::user(true)));
        let settings = TestFixtures::reconciler_settings();
        let session = TestFixtures::expired_session();

        let reconciliation = CallbackReconciler::new(Some(&client), &settings)
            .update_password(Some(&session), "hunter22", "hunter22")
            .await;

        assert_eq!(
            reconciliation.outcome,
            ReconciliationOutcome::Success(FlowType::Recovery)
        );
        assert_eq!(
            client.calls(),
            vec![IdentityCall::RefreshSession, IdentityCall::UpdatePassword]
        );
    }

    #[tokio::test]
    async fn test_password_rejection_keeps_form_and_session() {
        let client = MockIdentityClient::new().with_update_password(Err(IdentityError::api(
            422,
            Some("same_password"),
            "New password should be different from the old password.",
        )));
        let settings = TestFixtures::reconciler_settings();
        let session = TestFixtures::session(true);

        let reconciliation = CallbackReconciler::new(Some(&client), &settings)
            .update_password(Some(&session), "hunter22", "hunter22")
            .await;

        assert_eq!(
            reconciliation.outcome,
            ReconciliationOutcome::ShowRecoveryForm {
                form_error: Some("New password should be different from the old password.".to_string())
            }
        );
        assert_eq!(reconciliation.session, Some(session));
    }

    #[tokio::test]
    async fn test_password_transport_failure() {
        let client = MockIdentityClient::new()
            .with_update_password(Err(IdentityError::Transport("timed out".to_string())));
        let settings = TestFixtures::reconciler_settings();
        let session = TestFixtures::session(true);

        let reconciliation = CallbackReconciler::new(Some(&client), &settings)
            .update_password(Some(&session), "hunter22", "hunter22")
            .await;

        assert_eq!(
            reconciliation.outcome,
            ReconciliationOutcome::ShowRecoveryForm {
                form_error: Some("An unexpected error occurred. Please try again.".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_confirmation_status_variants() {
        let session = TestFixtures::session(true);

        let client = MockIdentityClient::new().with_get_user(Ok(TestFixtures::user(true)));
        assert_eq!(
            confirmation_status(&client, &session).await,
            SessionConfirmationStatus::Confirmed
        );

        let client = MockIdentityClient::new().with_get_user(Ok(TestFixtures::user(false)));
        assert_eq!(
            confirmation_status(&client, &session).await,
            SessionConfirmationStatus::NotConfirmed
        );

        let client = MockIdentityClient::new()
            .with_get_user(Err(IdentityError::api(401, Some("bad_jwt"), "invalid JWT")));
        match confirmation_status(&client, &session).await {
            SessionConfirmationStatus::Indeterminate(reason) => {
                assert!(reason.contains("token propagation lag"), "{reason}");
            }
            other => panic!("expected an indeterminate check, got {other:?}"),
        }

        let client = MockIdentityClient::new()
            .with_get_user(Err(IdentityError::Transport("connection reset".to_string())));
        assert_eq!(
            confirmation_status(&client, &session).await,
            SessionConfirmationStatus::Indeterminate(
                "identity service request failed: connection reset".to_string()
            )
        );
    }
}

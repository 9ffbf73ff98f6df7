use super::params::FlowType;

/// Shown whenever an identity call fails in a way the user cannot act on
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Shown when no identity service is configured
pub const NOT_CONFIGURED_MESSAGE: &str = "Authentication service is not configured.";

/// Every state the callback page can be in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// Waiting on the browser to forward the redirect parameters
    Loading,
    /// Password reset form, optionally with a validation or provider error
    ShowRecoveryForm { form_error: Option<String> },
    Success(FlowType),
    Error(String),
    /// Nothing recognisable in the redirect
    Unresolved,
}

/// Title and body text for an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeContent {
    pub title: &'static str,
    pub message: OutcomeMessage,
}

/// Outcome body: fixed copy, or text carried by the outcome itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeMessage {
    Static(&'static str),
    /// The `Error` outcome's own message
    Carried,
}

impl ReconciliationOutcome {
    #[must_use]
    pub fn content(&self) -> OutcomeContent {
        let (title, message) = match self {
            Self::Loading => ("Processing...", OutcomeMessage::Static("Please wait while we verify your request.")),
            Self::Error(_) => ("Something went wrong", OutcomeMessage::Carried),
            Self::ShowRecoveryForm { .. } => (
                "Reset Your Password",
                OutcomeMessage::Static("Enter your new password below."),
            ),
            Self::Success(flow) => success_content(*flow),
            Self::Unresolved => ("Authentication", OutcomeMessage::Static("Processing your request...")),
        };
        OutcomeContent { title, message }
    }

    /// Body text for this outcome
    #[must_use]
    pub fn message(&self) -> &str {
        if let Self::Error(message) = self {
            return message.as_str();
        }
        match self.content().message {
            OutcomeMessage::Static(text) => text,
            OutcomeMessage::Carried => "",
        }
    }

    /// Success and error pages end the flow and offer a way back
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Error(_))
    }

    /// Short label for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::ShowRecoveryForm { .. } => "recovery_form",
            Self::Success(_) => "success",
            Self::Error(_) => "error",
            Self::Unresolved => "unresolved",
        }
    }
}

const fn success_content(flow: FlowType) -> (&'static str, OutcomeMessage) {
    match flow {
        FlowType::Signup => (
            "Email Confirmed!",
            OutcomeMessage::Static(
                "Your email has been verified. You can now sign in to the NedilAI app.",
            ),
        ),
        FlowType::EmailChange => (
            "Email Updated!",
            OutcomeMessage::Static("Your email address has been successfully changed."),
        ),
        FlowType::Recovery => (
            "Password Reset Complete!",
            OutcomeMessage::Static(
                "Your password has been successfully updated. You can now sign in with your new password.",
            ),
        ),
        FlowType::Magiclink => (
            "Signed In!",
            OutcomeMessage::Static("You have been successfully signed in."),
        ),
        FlowType::Unknown => (
            "Success!",
            OutcomeMessage::Static("Your request has been processed successfully."),
        ),
    }
}

/// Result of asking the identity service whether a signup's email is confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionConfirmationStatus {
    Confirmed,
    NotConfirmed,
    /// The check itself failed; the reason is kept for logging
    Indeterminate(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_titles_per_flow() {
        let titles: Vec<_> = [
            FlowType::Signup,
            FlowType::EmailChange,
            FlowType::Recovery,
            FlowType::Magiclink,
            FlowType::Unknown,
        ]
        .into_iter()
        .map(|flow| ReconciliationOutcome::Success(flow).content().title)
        .collect();

        assert_eq!(
            titles,
            vec![
                "Email Confirmed!",
                "Email Updated!",
                "Password Reset Complete!",
                "Signed In!",
                "Success!"
            ]
        );
    }

    #[test]
    fn test_error_carries_its_message() {
        let outcome = ReconciliationOutcome::Error("access_denied".to_string());
        assert_eq!(outcome.content().title, "Something went wrong");
        assert_eq!(outcome.message(), "access_denied");
        assert!(outcome.is_terminal());
    }

    #[test]
    fn test_unresolved_and_loading() {
        assert_eq!(ReconciliationOutcome::Unresolved.content().title, "Authentication");
        assert_eq!(
            ReconciliationOutcome::Unresolved.message(),
            "Processing your request..."
        );
        assert_eq!(ReconciliationOutcome::Loading.content().title, "Processing...");
        assert!(!ReconciliationOutcome::Loading.is_terminal());
        assert!(!ReconciliationOutcome::Unresolved.is_terminal());
    }

    #[test]
    fn test_recovery_form_is_not_terminal() {
        let outcome = ReconciliationOutcome::ShowRecoveryForm {
            form_error: Some("Passwords do not match.".to_string()),
        };
        assert_eq!(outcome.content().title, "Reset Your Password");
        assert!(!outcome.is_terminal());
        assert_eq!(outcome.kind(), "recovery_form");
    }
}

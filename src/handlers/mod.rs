// HTTP request handlers for the auth callback
pub mod callback;
pub mod health;
pub mod pages;
pub mod password;

use actix_web::{cookie::Cookie, web};

use crate::callback::{CallbackReconciler, Reconciliation, ReconciliationOutcome};
use crate::identity::SharedIdentityClient;
use crate::session::CookieFactory;
use crate::settings::NedilSettings;
use pages::PageContext;

// Re-export the main handler functions
pub use callback::{callback_page, callback_submit};
pub use health::health;
pub use password::password_submit;

/// Route the identity service redirects email links to
pub const CALLBACK_PATH: &str = "/auth/callback";

/// Route the password reset form posts to
pub const PASSWORD_PATH: &str = "/auth/callback/password";

/// Shared, read-only state for the callback handlers
pub struct CallbackState {
    identity: Option<SharedIdentityClient>,
    settings: NedilSettings,
    cookies: CookieFactory,
}

impl CallbackState {
    #[must_use]
    pub fn new(identity: Option<SharedIdentityClient>, settings: NedilSettings) -> Self {
        let cookies = CookieFactory::from_settings(&settings);
        Self {
            identity,
            settings,
            cookies,
        }
    }

    /// Reconciler borrowing the shared identity client
    #[must_use]
    pub fn reconciler(&self) -> CallbackReconciler<'_> {
        CallbackReconciler::new(self.identity.as_deref(), &self.settings.reconciler)
    }

    #[must_use]
    pub fn is_identity_configured(&self) -> bool {
        self.identity.is_some()
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieFactory {
        &self.cookies
    }

    #[must_use]
    pub fn page_context(&self) -> PageContext<'_> {
        PageContext {
            site_name: &self.settings.application.site_name,
            min_password_length: self.settings.reconciler.min_password_length,
        }
    }

    /// Cookie to send with a rendered outcome
    ///
    /// A recovery form with a session keeps the session in the encrypted
    /// cookie; every other outcome clears it.
    #[must_use]
    pub fn recovery_cookie_for(&self, reconciliation: &Reconciliation) -> Cookie<'static> {
        match (&reconciliation.outcome, &reconciliation.session) {
            (ReconciliationOutcome::ShowRecoveryForm { .. }, Some(session)) => {
                self.cookies.create_recovery_cookie(session).unwrap_or_else(|e| {
                    log::warn!("Failed to create recovery session cookie: {e}");
                    self.cookies.create_expired_recovery_cookie()
                })
            }
            _ => self.cookies.create_expired_recovery_cookie(),
        }
    }
}

/// Register all routes
pub fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg.route(CALLBACK_PATH, web::get().to(callback_page))
        .route(CALLBACK_PATH, web::post().to(callback_submit))
        .route(PASSWORD_PATH, web::post().to(password_submit))
        // Health endpoint
        .route("/ping", web::get().to(health));
}

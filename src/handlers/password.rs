use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::fmt;

use super::pages::render_page;
use super::CallbackState;
use crate::utils::responses::ResponseBuilder;

/// Password reset form fields
#[derive(Deserialize, Default)]
pub struct PasswordForm {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl fmt::Debug for PasswordForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordForm").finish_non_exhaustive()
    }
}

/// Apply a new password using the recovery session from the cookie
pub async fn password_submit(
    req: HttpRequest,
    form: web::Form<PasswordForm>,
    state: web::Data<CallbackState>,
) -> HttpResponse {
    let session = state.cookies().recovery_session_from_request(&req);
    let reconciliation = state
        .reconciler()
        .update_password(session.as_ref(), &form.password, &form.confirm_password)
        .await;

    ResponseBuilder::page(render_page(&reconciliation.outcome, &state.page_context()))
        .with_cookie(state.recovery_cookie_for(&reconciliation))
        .build()
}

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use super::pages::render_page;
use super::CallbackState;
use crate::callback::{CallbackParameters, ReconciliationOutcome};
use crate::utils::responses::ResponseBuilder;

/// Redirect parameters forwarded by the loading page's script
#[derive(Deserialize, Default)]
pub struct CallbackForm {
    #[serde(default)]
    pub fragment: String,
    #[serde(default)]
    pub query: String,
}

/// Email link landing page
///
/// Only renders the loading state; the reconciliation happens once the
/// browser posts the fragment back.
pub async fn callback_page(state: web::Data<CallbackState>) -> HttpResponse {
    ResponseBuilder::page(render_page(
        &ReconciliationOutcome::Loading,
        &state.page_context(),
    ))
    .build()
}

/// Reconcile the forwarded redirect parameters and render the outcome
pub async fn callback_submit(
    form: web::Form<CallbackForm>,
    state: web::Data<CallbackState>,
) -> HttpResponse {
    let params = CallbackParameters::from_parts(&form.fragment, &form.query);
    let reconciliation = state.reconciler().reconcile(&params).await;

    ResponseBuilder::page(render_page(&reconciliation.outcome, &state.page_context()))
        .with_cookie(state.recovery_cookie_for(&reconciliation))
        .build()
}

use actix_web::{web, HttpResponse};

use super::CallbackState;
use crate::models::HealthResponse;
use crate::utils::responses::ResponseBuilder;

/// Health check endpoint
pub async fn health(state: web::Data<CallbackState>) -> HttpResponse {
    ResponseBuilder::json(&HealthResponse {
        status: "ok".to_string(),
        message: "NedilAI auth callback service is running".to_string(),
        identity_configured: state.is_identity_configured(),
        version: crate::VERSION.to_string(),
    })
}

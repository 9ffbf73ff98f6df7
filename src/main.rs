#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{
    middleware::{Compress, Logger},
    web, App, HttpServer,
};
use nedilai_callback::{
    configure_services, settings::NedilSettings, utils::logging::LoggingHelper, CallbackState,
    GoTrueClient, SharedIdentityClient,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = NedilSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;

    let identity = build_identity_client(&settings);
    start_server(identity, settings).await
}

/// Build the process-wide identity client; missing or invalid configuration
/// leaves the service running in its "not configured" state
fn build_identity_client(settings: &NedilSettings) -> Option<SharedIdentityClient> {
    match GoTrueClient::from_settings(&settings.identity) {
        Ok(Some(client)) => {
            LoggingHelper::log_identity_init(Some(client.auth_url()));
            Some(Arc::new(client))
        }
        Ok(None) => {
            LoggingHelper::log_identity_init(None);
            None
        }
        Err(e) => {
            LoggingHelper::log_identity_init_failed(&e);
            None
        }
    }
}

/// Start the HTTP server
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(
    identity: Option<SharedIdentityClient>,
    settings: NedilSettings,
) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, identity.is_some(), &settings);

    let cors_origins = settings.get_cors_origins();
    let state = web::Data::new(CallbackState::new(identity, settings));

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec!["Content-Type", "Accept"])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Compress::default())
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, identity_configured: bool, settings: &NedilSettings) {
    println!(
        "Starting {} auth callback service on http://{bind_address}",
        settings.application.site_name
    );
    println!(
        "Identity service: {}",
        if identity_configured {
            settings.identity.url.as_str()
        } else {
            "not configured"
        }
    );
    println!();
    println!("Callback endpoints:");
    println!("  GET  /auth/callback          - Email link landing page");
    println!("  POST /auth/callback          - Reconcile forwarded redirect parameters");
    println!("  POST /auth/callback/password - Password reset form submission");
    println!();
    println!("System endpoints:");
    println!("  GET  /ping                   - Health check");
}

#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use confirmrs::{
    analytics::AnalyticsDispatcher,
    configure_services,
    flow::ProfileSync,
    handlers::FlowDependencies,
    provider::SupabaseClient,
    session::SessionCookieFactory,
    settings::ConfirmrsSettings,
    storage::FileConfirmationStore,
    utils::logging::LoggingHelper,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = ConfirmrsSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;

    let provider = SupabaseClient::from_settings(&settings.provider).map_err(|e| {
        std::io::Error::other(format!("Failed to configure identity provider: {e}"))
    })?;
    LoggingHelper::log_provider_configured(&settings);

    let store = FileConfirmationStore::open(&settings.storage.record_dir)
        .map_err(|e| std::io::Error::other(format!("Failed to open record store: {e}")))?;

    let deps = FlowDependencies {
        store: Arc::new(store),
        analytics: AnalyticsDispatcher::from_settings(&settings.analytics),
        profile_sync: ProfileSync::from_settings(&settings.profile),
    };

    start_server(provider, deps, settings).await
}

/// Start the HTTP server
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(
    provider: SupabaseClient,
    deps: FlowDependencies,
    settings: ConfirmrsSettings,
) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings, &deps);

    let cookie_factory = SessionCookieFactory::from_settings(&settings);

    // Configure CORS for the registration pages
    let cors_origins = settings.get_cors_origins();

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
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(provider.clone()))
            .app_data(web::Data::new(deps.clone()))
            .app_data(web::Data::new(cookie_factory.clone()))
            .app_data(web::Data::new(settings.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .configure(configure_services::<SupabaseClient>)
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, settings: &ConfirmrsSettings, deps: &FlowDependencies) {
    println!(
        "Starting Confirmrs {} on http://{bind_address}",
        confirmrs::VERSION
    );
    println!();
    println!("Confirmation endpoints:");
    println!("  GET  /auth/confirm   - Confirmation page");
    println!("  POST /auth/confirm   - Resolve redirect parameters");
    println!();
    println!("Registration endpoints:");
    println!("  POST /auth/register  - Sign up");
    println!("  POST /auth/resend    - Resend confirmation email");
    println!("  GET  /auth/session   - Existing-session check");
    println!();
    println!("Confirmation link target for the identity provider:");
    println!("  {}", settings.get_confirm_url());
    println!();
    println!("Confirmation records: {}", settings.storage.record_dir);
    println!("Analytics sinks: {}", deps.analytics.sink_count());
    println!();
    println!("System endpoints:");
    println!("  GET  /ping           - Health check");
    println!("  GET  /auth/static/*  - Static files (HTML, CSS, JS, images)");
    println!(
        "  Static files folder: {}",
        settings.static_files.assets_folder
    );
}

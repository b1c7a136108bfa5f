use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use storybook_forge::{api, config};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    config::Config::dotenv_load();
    let config = match config::Config::new() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(2);
        }
    };
    config::Config::print_env_vars();
    if config.api_key.is_none() {
        tracing::warn!("GOOGLE_API_KEY is not set; sessions must provide their own key");
    }

    // Run our application with safe parsing
    let host_str = config.api_host.clone();
    let port_str = config.api_port.clone();
    let ip: std::net::IpAddr = host_str.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid API_HOST '{}', falling back to 127.0.0.1", host_str);
        std::net::IpAddr::from([127, 0, 0, 1])
    });
    let port: u16 = port_str.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid API_PORT '{}', falling back to 8190", port_str);
        8190
    });

    let state = Arc::new(api::routes::AppState::gemini(config));
    let app = api::routes::router(state);

    let socket_address = SocketAddr::new(ip, port);
    tracing::info!("listening on {}", socket_address);
    if let Err(e) = axum::Server::bind(&socket_address)
        .serve(app.into_make_service())
        .await
    {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use order_gateway::{auth::JwtIdentityVerifier, payment::SandboxPaymentGateway, AppState, Config};
use reservation_core::OrderService;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("order_gateway=info,reservation_core=info,actix_web=info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    info!("Starting Order Gateway...");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Server will listen on {}", config.bind_address());

    let payments = Arc::new(SandboxPaymentGateway::new(config.sandbox.latency_ms));
    let service = Arc::new(
        OrderService::open(config.core.clone(), payments).context("Failed to open order service")?,
    );
    info!(
        public_key = %hex::encode(service.public_key()),
        "Solution signing key ready"
    );

    let state = web::Data::new(AppState {
        service: service.clone(),
        identity: Arc::new(JwtIdentityVerifier::new(&config.auth.jwt_secret)),
    });

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(order_gateway::configure)
    })
    .bind(config.bind_address())?
    .run()
    .await?;

    info!("HTTP server stopped, shutting down registry");
    service.shutdown().await?;
    Ok(())
}

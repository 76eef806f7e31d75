use agritrack_api::{app, config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present so cargo run picks up DATABASE_URL and friends.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agritrack_api=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env();
    config.validate()?;
    tracing::info!(environment = ?config.environment, "starting agritrack-api");

    let database_url = std::env::var("DATABASE_URL")?;
    let state = AppState::connect(config, &database_url).await?;

    let app = app::router(state);

    // Allow deployments to override the listen port via env.
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

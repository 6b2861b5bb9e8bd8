use anyhow::Context;
use skirmish_server::app::{build_router, spawn_session};
use skirmish_server::config::ServerConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("skirmish_server=info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::from_env().context("reading configuration")?;

    // Validate configuration before starting
    config.validate().context("invalid server configuration")?;

    let app_state = spawn_session(&config);
    let app = build_router(app_state, config.static_dir.as_deref());

    match &config.static_dir {
        Some(dir) => tracing::info!("Serving client assets from {}", dir.display()),
        None => tracing::info!("No client assets configured"),
    }
    tracing::info!("Starting skirmish relay on {}", config.listen_addr);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

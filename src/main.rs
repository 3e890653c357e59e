use anyhow::Context;
use fashion_studio::{config::GenerationMode, router, telemetry, AppState, Settings};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let settings = Settings::load().context("failed to load configuration")?;
    telemetry::init(settings.log.json);

    let bind_addr = settings.bind_addr();
    match settings.generation.mode {
        GenerationMode::Webhook => info!(webhook = %settings.webhook.url, "Generating through webhook"),
        GenerationMode::Echo => info!(delay_ms = settings.generation.echo_delay_ms, "Generating in local echo mode"),
    }

    let state = Arc::new(AppState::new(settings).context("failed to build HTTP client")?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Fashion Studio v{} running on http://{}", env!("CARGO_PKG_VERSION"), bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

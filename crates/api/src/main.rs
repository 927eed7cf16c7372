use anyhow::Context;

use satchel_api::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    satchel_observability::init(&config.log());

    if config.access_token.is_none() {
        tracing::warn!("SATCHEL_ACCESS_TOKEN not set; using insecure dev default");
    }

    let app = satchel_api::app::build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

//! Trend-following portfolio engine server: webhook intake, background
//! schedulers (rollover, EOD monitor, heartbeat), and the leader-election
//! renewal loop, all behind one HTTP listener.

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use trend_portfolio_engine::application::bootstrap::AppBootstrap;
use trend_portfolio_engine::config::Config;
use trend_portfolio_engine::interfaces::http::build_router;
use trend_portfolio_engine::interfaces::http::state::ApiState;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("failed to load configuration")?;
    tracing_subscriber::fmt()
        .with_env_filter(config.observability.log_filter.clone())
        .init();

    info!("trend-following portfolio engine starting");

    let app = AppBootstrap::init(config).await.context("bootstrap failed")?;

    tokio::spawn(app.leader_elector.clone().renew_loop(std::time::Duration::from_secs(
        app.config.persistence.leader_renew_interval_seconds,
    )));
    app.scheduler.clone().run(app.engine.clone()).await;

    let bind_address = app.config.observability.http_bind_address.clone();
    let port = app.config.observability.http_port;
    let state = ApiState { engine: app.engine.clone(), config: app.config.clone() };
    let router = build_router(state);

    let listener = TcpListener::bind((bind_address.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {bind_address}:{port}"))?;
    info!(%bind_address, port, "HTTP server listening");
    axum::serve(listener, router).await.context("HTTP server exited")?;
    Ok(())
}

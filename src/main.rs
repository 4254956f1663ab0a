use anyhow::Result;
use grill_stats::{api, config::Config, telemetry, Database};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load()?;
    telemetry::init_tracing(&cfg.logging)?;

    let db = Database::connect(&cfg.database).await?;
    if cfg.database.auto_migrate {
        db.create_schema().await?;
    }

    let state = api::AppState::new(db.managers());
    let app = api::router(state, &cfg);

    let addr = cfg.server.socket_addr()?;
    if cfg.server.host == "0.0.0.0" {
        warn!("binding to 0.0.0.0; the API has no authentication");
    }
    info!(%addr, "starting Grill Stats");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    db.close().await;
    warn!("shutdown complete");
    Ok(())
}

mod color;
mod config;
mod data;
mod logging;
mod plot;
mod storage;
mod web;

use clap::Parser;

use config::Config;
use web::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logging::init(config.log_filter(), &config.error_log)?;

    let state = AppState::from_config(&config)?;
    let app = web::router(state);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!(
        "csv-lens listening on http://{addr} (uploads in {}, charts in {})",
        config.upload_dir.display(),
        config.static_dir.join("plots").display()
    );
    if config.debug {
        log::debug!("debug mode: error details are included in 500 responses");
    }
    axum::serve(listener, app).await?;
    Ok(())
}

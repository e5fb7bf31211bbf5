//! HTTP surface.
//!
//! ```text
//!  GET  /                    upload form
//!  POST /upload              multipart `file` → 302 /analyze/<name>
//!  GET  /analyze/:filename   column picker
//!  POST /analyze/:filename   form `column` → JSON summary + plot url
//!  GET  /static/...          generated charts
//! ```

use std::path::PathBuf;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::plot::{PlotSize, PlotStore};
use crate::storage::UploadStore;

pub mod error;
pub mod handlers;
pub mod views;

/// Shared, cheaply clonable handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub uploads: UploadStore,
    pub plots: PlotStore,
    pub plot_size: PlotSize,
    pub static_dir: PathBuf,
    pub upload_limit_bytes: usize,
    /// Include error details in 500 bodies.
    pub verbose_errors: bool,
}

impl AppState {
    /// Create the upload and plot directories named by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let uploads = UploadStore::open(&config.upload_dir)?;
        let plots = PlotStore::open(&config.static_dir).with_context(|| {
            format!("creating plot directory under {}", config.static_dir.display())
        })?;
        Ok(Self {
            uploads,
            plots,
            plot_size: PlotSize::default(),
            static_dir: config.static_dir.clone(),
            upload_limit_bytes: config.upload_limit_bytes(),
            verbose_errors: config.debug,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.static_dir);
    let upload_limit = state.upload_limit_bytes;

    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/analyze/:filename",
            get(handlers::list_columns).post(handlers::summarize),
        )
        .nest_service("/static", static_files)
        .with_state(state)
}

#[cfg(test)]
mod tests;

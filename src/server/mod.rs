//! Local review dashboard: HTML pages and fragments over the channel root.

mod error;
mod handlers;
mod templates;

pub use error::ServerError;

use crate::config::Config;
use crate::init;
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use handlebars::Handlebars;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub templates: Arc<Handlebars<'static>>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            config: Arc::new(config),
            templates: Arc::new(templates::build()?),
            http: crate::api::http_client()?,
        })
    }

    /// Directory of one video; rejects names that would leave the channel root.
    pub fn video_dir(&self, series: &str, n: u32) -> Result<PathBuf, ServerError> {
        if series.is_empty() || series.starts_with('.') || series.contains(['/', '\\']) {
            return Err(ServerError::BadRequest(format!("invalid series name '{series}'")));
        }
        Ok(self.config.channel_root.join(series).join(n.to_string()))
    }

    /// URL under `/data` for a file inside the channel root.
    pub fn media_url(&self, file: &Path) -> Option<String> {
        let rel = pathdiff::diff_paths(file, &self.config.channel_root)?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(format!("/data/{}", parts.join("/")))
    }
}

pub fn router(state: AppState) -> Router {
    let media = ServeDir::new(&state.config.channel_root);

    Router::new()
        .route("/", get(handlers::dashboard))
        .route("/api/status", get(handlers::api_status))
        .route("/storyboard/:series/:n", get(handlers::storyboard))
        .route(
            "/storyboard/update/:series/:n/:index/:field",
            post(handlers::update_scene),
        )
        .route(
            "/storyboard/update_image_status/:series/:n/:index/:is_completed",
            post(handlers::update_image_status),
        )
        .route(
            "/storyboard/remake_image/:series/:n/:index",
            post(handlers::remake_image),
        )
        .route("/video/:series/:n/:stage", post(handlers::run_stage))
        .nest_service("/data", media)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Config) -> Result<()> {
    let addr: SocketAddr = config
        .server_addr
        .parse()
        .with_context(|| format!("invalid server_addr '{}'", config.server_addr))?;
    init::ensure_directories(&config.channel_root).await?;

    let root = config.channel_root.display().to_string();
    let app = router(AppState::new(config)?);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("dashboard on http://{} serving {}", addr, root);

    axum::serve(listener, app).await.context("server stopped")?;
    Ok(())
}

// src/server/mod.rs

//! HTTP request shell.
//!
//! Exposes the job control surface (start/stop/progress/results/
//! export) over axum. Handlers stay thin: they claim or poll the job
//! slots and spawn the orchestrator onto a background task.

pub mod handlers;
pub mod routes;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::info;

use crate::error::{AppError, Result};
use crate::jobs::JobHandle;
use crate::models::Config;
use crate::services::{AnnuaireClient, DirectoryClient};
use crate::utils::http::create_client;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub directory: Arc<DirectoryClient>,
    pub annuaire: Arc<AnnuaireClient>,
    pub startup_job: JobHandle,
    pub school_job: JobHandle,
}

impl AppState {
    /// Build the state: one shared HTTP client, one client per source,
    /// one job slot per job class.
    pub fn new(config: Config) -> Result<Self> {
        let client = create_client(&config.crawler)?;
        let directory = Arc::new(DirectoryClient::new(client.clone(), config.crawler.clone()));
        let annuaire = Arc::new(AnnuaireClient::new(client, config.annuaire.clone()));

        Ok(Self {
            config: Arc::new(config),
            directory,
            annuaire,
            startup_job: JobHandle::new("startups"),
            school_job: JobHandle::new("schools"),
        })
    }
}

/// Run the server until ctrl-c.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, routes::create_routes(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::JobRunning(_) => StatusCode::CONFLICT,
            AppError::NoData | AppError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let conflict = AppError::JobRunning("startups".to_string()).into_response();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let no_data = AppError::NoData.into_response();
        assert_eq!(no_data.status(), StatusCode::BAD_REQUEST);

        let unsupported = AppError::UnsupportedFormat("pdf".to_string()).into_response();
        assert_eq!(unsupported.status(), StatusCode::BAD_REQUEST);

        let other = AppError::config("boom").into_response();
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

//! Request handlers.

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::Result;
use crate::export;
use crate::harvest::{ListingSource, Orchestrator};
use crate::jobs::{JobHandle, JobStatus};
use crate::models::Record;
use crate::server::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Fresh category discovery. Partial results are valid, so this never
/// errors.
pub async fn categories(State(state): State<AppState>) -> Json<serde_json::Value> {
    let categories = state.directory.fetch_categories().await;
    Json(json!(categories))
}

#[derive(Debug, Deserialize)]
pub struct HarvestRequest {
    /// Listing pages to crawl; 0 means all pages
    #[serde(default = "default_pages")]
    pub pages: usize,

    /// Also visit each startup's detail page
    #[serde(default)]
    pub with_details: bool,

    /// Restrict to one category slug
    #[serde(default)]
    pub category: Option<String>,

    /// Crawl every discovered category, deduplicating across them
    #[serde(default)]
    pub all_categories: bool,
}

fn default_pages() -> usize {
    1
}

pub async fn start_harvest(
    State(state): State<AppState>,
    Json(request): Json<HarvestRequest>,
) -> Result<Json<serde_json::Value>> {
    let pages = if request.pages == 0 {
        0
    } else {
        request.pages.min(state.config.crawler.max_pages)
    };

    let token = state.startup_job.begin(pages)?;
    let orchestrator = Orchestrator::new(
        state.directory.clone() as Arc<dyn ListingSource>,
        &state.config.crawler,
        token,
    );
    let job = state.startup_job.clone();
    let category = request.category.filter(|slug| !slug.is_empty());

    info!(
        "starting startup harvest: pages={}, details={}, category={:?}, all={}",
        pages, request.with_details, category, request.all_categories
    );

    tokio::spawn(async move {
        let startups = if request.all_categories {
            orchestrator
                .run_all_categories(request.with_details, &job)
                .await
        } else {
            orchestrator
                .run(pages, request.with_details, category.as_deref(), &job)
                .await
        };
        job.complete(startups.into_iter().map(Record::from).collect());
    });

    Ok(Json(json!({ "status": "started", "pages": pages })))
}

pub async fn stop_harvest(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.startup_job.stop();
    Json(json!({ "status": "stopping" }))
}

pub async fn harvest_progress(State(state): State<AppState>) -> Json<JobStatus> {
    Json(state.startup_job.status())
}

pub async fn harvest_results(State(state): State<AppState>) -> Json<Vec<Record>> {
    Json(state.startup_job.results())
}

pub async fn harvest_export(
    State(state): State<AppState>,
    Path(format): Path<String>,
) -> Result<Response> {
    export_job(&state, &state.startup_job, &format, "startups").await
}

#[derive(Debug, Deserialize)]
pub struct SchoolsRequest {
    /// Department code or name to filter by
    #[serde(default)]
    pub department: Option<String>,

    /// Record cap; 0 means all
    #[serde(default)]
    pub max_records: usize,
}

pub async fn start_schools(
    State(state): State<AppState>,
    Json(request): Json<SchoolsRequest>,
) -> Result<Json<serde_json::Value>> {
    let token = state.school_job.begin(request.max_records)?;
    let client = state.annuaire.clone();
    let job = state.school_job.clone();
    let department = request.department.filter(|d| !d.is_empty());

    info!(
        "starting school harvest: department={:?}, max_records={}",
        department, request.max_records
    );

    tokio::spawn(async move {
        let schools = client
            .run(department.as_deref(), request.max_records, &job, &token)
            .await;
        job.complete(schools.into_iter().map(Record::from).collect());
    });

    Ok(Json(json!({ "status": "started" })))
}

pub async fn stop_schools(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.school_job.stop();
    Json(json!({ "status": "stopping" }))
}

pub async fn schools_progress(State(state): State<AppState>) -> Json<JobStatus> {
    Json(state.school_job.status())
}

pub async fn schools_results(State(state): State<AppState>) -> Json<Vec<Record>> {
    Json(state.school_job.results())
}

pub async fn schools_export(
    State(state): State<AppState>,
    Path(format): Path<String>,
) -> Result<Response> {
    export_job(&state, &state.school_job, &format, "schools").await
}

/// Export a job's collected records and serve the file as a download.
async fn export_job(
    state: &AppState,
    job: &JobHandle,
    format: &str,
    prefix: &str,
) -> Result<Response> {
    let records = job.results();
    let dir = state.config.export.data_dir.clone();
    let path = export::export(&records, format, FsPath::new(&dir), prefix)?;

    let bytes = tokio::fs::read(&path).await?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("export")
        .to_string();

    Ok((
        [
            (header::CONTENT_TYPE, export::content_type(&path).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

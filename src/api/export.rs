use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::export::{export_file_name, export_json, today, write_export};
use crate::models::ResultRecord;
use crate::state::AppState;

/// POST /api/export - Return the posted result list as a dated JSON download
pub async fn export(
    Json(records): Json<Vec<ResultRecord>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let body = export_json(&records).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize results: {e}"),
        )
    })?;
    let disposition = format!("attachment; filename=\"{}\"", export_file_name(today()));

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

#[derive(Debug, Serialize)]
pub struct SavedExport {
    pub path: String,
    pub count: usize,
}

/// POST /api/export/save - Write the posted result list into the export dir
pub async fn save_export(
    State(state): State<AppState>,
    Json(records): Json<Vec<ResultRecord>>,
) -> Result<(StatusCode, Json<SavedExport>), (StatusCode, String)> {
    let dir = state.config.export_dir.clone();
    let count = records.len();

    let path = tokio::task::spawn_blocking(move || write_export(&dir, &records, today()))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Export task failed: {e}"),
            )
        })?
        .map_err(|e| {
            tracing::warn!("Export failed: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
        })?;

    Ok((
        StatusCode::CREATED,
        Json(SavedExport {
            path: path.display().to_string(),
            count,
        }),
    ))
}

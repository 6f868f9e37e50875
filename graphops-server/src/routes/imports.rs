//! Workspace-scoped import endpoints: upload + synchronous execution,
//! run status, and diffs.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use graphops_api::ImportDiff;
use graphops_core::{ChangeStats, ImportRun};

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Actor label recorded on import change events.
const IMPORT_ACTOR: &str = "api:import";

#[derive(Serialize)]
pub struct ImportCreateResponse {
    pub import_run_id: String,
    pub status: String,
    pub change_event_id: String,
    pub stats: ChangeStats,
}

/// Upload a source file and run the import synchronously.
///
/// Multipart fields: `file` (the workbook or CSV) and `spec_name` (the
/// ingest spec, without extension).
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(wid): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ImportCreateResponse>> {
    let mut spec_name: Option<String> = None;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("spec_name") => {
                spec_name = Some(field.text().await?);
            }
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(sanitize_filename)
                    .ok_or_else(|| ServerError::bad_request("file part needs a filename"))?;
                let bytes = field.bytes().await?;
                upload = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let spec_name =
        spec_name.ok_or_else(|| ServerError::bad_request("missing 'spec_name' field"))?;
    let (filename, bytes) =
        upload.ok_or_else(|| ServerError::bad_request("missing 'file' field"))?;

    let upload_dir = state.config.upload_dir.join(&wid);
    std::fs::create_dir_all(&upload_dir)
        .map_err(|e| graphops_core::Error::internal(format!("cannot create upload dir: {e}")))?;
    let file_path = upload_dir.join(&filename);
    std::fs::write(&file_path, &bytes)
        .map_err(|e| graphops_core::Error::internal(format!("cannot store upload: {e}")))?;

    // Run on a detached task: a client disconnect must not cancel the
    // pipeline mid-write. The run record still ends up ok/failed either
    // way.
    let task_state = state.clone();
    let task_wid = wid.clone();
    let outcome = tokio::spawn(async move {
        task_state
            .ops
            .run_import(&task_wid, &spec_name, &file_path, IMPORT_ACTOR)
            .await
    })
    .await
    .map_err(|e| graphops_core::Error::internal(format!("import task aborted: {e}")))??;

    Ok(Json(ImportCreateResponse {
        import_run_id: outcome.run.import_run_id,
        status: outcome.run.status.as_str().to_string(),
        change_event_id: outcome.change_event_id,
        stats: outcome.stats.change_stats(),
    }))
}

fn sanitize_filename(name: &str) -> String {
    std::path::Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string()
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(wid): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ImportRun>>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let runs = state.ops.list_imports(&wid, limit).await?;
    Ok(Json(runs))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path((wid, import_run_id)): Path<(String, String)>,
) -> Result<Json<ImportRun>> {
    let run = state.ops.get_import(&wid, &import_run_id).await?;
    Ok(Json(run))
}

pub async fn diff(
    State(state): State<Arc<AppState>>,
    Path((wid, import_run_id)): Path<(String, String)>,
) -> Result<Json<ImportDiff>> {
    let diff = state.ops.import_diff(&wid, &import_run_id).await?;
    Ok(Json(diff))
}

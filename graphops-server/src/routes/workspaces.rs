//! Workspace management endpoints (not workspace-scoped)

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use graphops_api::WorkspaceInfo;
use graphops_spec::DomainSchema;

use crate::error::Result;
use crate::state::AppState;

#[derive(Serialize)]
pub struct WorkspaceList {
    pub workspaces: Vec<WorkspaceInfo>,
}

pub async fn list(State(state): State<Arc<AppState>>) -> Json<WorkspaceList> {
    Json(WorkspaceList {
        workspaces: state.ops.list_workspaces(),
    })
}

#[derive(Deserialize)]
pub struct WorkspaceCreate {
    pub id: String,
    pub schema_yaml: String,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<WorkspaceCreate>,
) -> Result<(StatusCode, Json<WorkspaceInfo>)> {
    let info = state.ops.create_workspace(&body.id, &body.schema_yaml)?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// Resolved domain schema of a workspace.
pub async fn schema(
    State(state): State<Arc<AppState>>,
    Path(wid): Path<String>,
) -> Result<Json<DomainSchema>> {
    let schema = state.ops.workspace_schema(&wid)?;
    Ok(Json((*schema).clone()))
}

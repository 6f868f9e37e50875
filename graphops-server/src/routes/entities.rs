//! Workspace-scoped entity endpoints: search and resolved/all-claims
//! detail.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use graphops_api::{EntityDetail, EntitySummary, ViewMode};

use crate::error::Result;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SearchParams {
    pub entity_type: Option<String>,
    pub primary_key: Option<String>,
    /// Case-insensitive substring over display names.
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub entities: Vec<EntitySummary>,
    pub total: usize,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(wid): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let entities = state
        .ops
        .search_entities(
            &wid,
            params.entity_type.as_deref(),
            params.primary_key.as_deref(),
            params.q.as_deref(),
            params.limit,
        )
        .await?;
    let total = entities.len();
    Ok(Json(SearchResponse { entities, total }))
}

#[derive(Deserialize)]
pub struct DetailParams {
    pub view_mode: Option<ViewMode>,
    pub scenario_id: Option<String>,
    /// Point in time to resolve at (RFC 3339); defaults to now.
    pub as_of: Option<DateTime<Utc>>,
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    Path((wid, entity_id)): Path<(String, String)>,
    Query(params): Query<DetailParams>,
) -> Result<Json<EntityDetail>> {
    let detail = state
        .ops
        .entity_detail(
            &wid,
            &entity_id,
            params.view_mode.unwrap_or_default(),
            params.scenario_id.as_deref().unwrap_or("base"),
            params.as_of,
        )
        .await?;
    Ok(Json(detail))
}

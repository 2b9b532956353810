//! Layout endpoints.

use std::sync::Arc;

use allocation::{Operation, authorize};
use axum::Json;
use axum::extract::{Path, State};
use common::InventoryKind;
use domain::{Block, Layout};
use event_store::EventStore;
use serde::Deserialize;

use super::parse_path;
use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ReplaceLayoutRequest {
    pub blocks: Vec<Block>,
}

/// GET /layouts/{kind}: the current layout, through the cache.
pub async fn get<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(kind): Path<String>,
) -> Result<Json<Layout>, ApiError> {
    let kind: InventoryKind = parse_path(&kind)?;
    let layout = state.coordinator.get_layout(kind).await?;
    Ok(Json(layout.as_ref().clone()))
}

/// PUT /layouts/{kind}: replaces every block of a kind.
///
/// Existing slice state is untouched; units of removed blocks simply stop
/// being allocatable.
pub async fn replace<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(kind): Path<String>,
    Json(req): Json<ReplaceLayoutRequest>,
) -> Result<Json<Layout>, ApiError> {
    let kind: InventoryKind = parse_path(&kind)?;
    authorize(&actor, Operation::ManageLayout)?;

    let layout = state.layouts.replace_blocks(kind, req.blocks).await?;
    tracing::info!(%kind, revision = layout.revision(), actor = %actor, "layout replaced via API");
    Ok(Json(layout))
}

//! Slice availability, allocation and live stream endpoints.

use std::sync::Arc;

use allocation::{
    AllocationOutcome, AllocationPolicy, BulkAction, BulkOutcome, ReconnectingSubscription,
    Selection, SliceSnapshot, UnitView,
};
use axum::Json;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use common::{BookingId, SliceKey};
use domain::{MigrationReport, Transition, TransitionKind};
use event_store::EventStore;
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Deserialize;

use super::parse_path;
use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct AllocateRequest {
    pub unit_ids: Vec<String>,
    pub transition: TransitionKind,
    /// Required to block.
    #[serde(default)]
    pub reason: Option<String>,
    /// Required to release.
    #[serde(default)]
    pub booking_id: Option<BookingId>,
    #[serde(default)]
    pub policy: AllocationPolicy,
}

impl AllocateRequest {
    fn transition(&self) -> Result<Transition, ApiError> {
        match self.transition {
            // Booked units must belong to a booking record.
            TransitionKind::Book => Err(ApiError::BadRequest(
                "units are booked through POST /bookings".to_string(),
            )),
            TransitionKind::Block => match self.reason.as_deref().map(str::trim) {
                Some(reason) if !reason.is_empty() => Ok(Transition::Block {
                    reason: reason.to_string(),
                }),
                _ => Err(ApiError::BadRequest("blocking requires a reason".to_string())),
            },
            TransitionKind::Unblock => Ok(Transition::Unblock),
            TransitionKind::Release => self
                .booking_id
                .map(|booking_id| Transition::Release { booking_id })
                .ok_or_else(|| ApiError::BadRequest("release requires a booking_id".to_string())),
        }
    }
}

#[derive(Deserialize)]
pub struct BulkRequest {
    pub selection: Selection,
    pub action: BulkAction,
}

// -- Handlers --

/// GET /slices/{key}: the full unit map at the current version.
pub async fn get<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(key): Path<String>,
) -> Result<Json<SliceSnapshot>, ApiError> {
    let key: SliceKey = parse_path(&key)?;
    Ok(Json(state.coordinator.get_slice(&key).await?))
}

/// GET /slices/{key}/units/{unit}: one unit with its layout attributes.
pub async fn unit<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((key, unit)): Path<(String, String)>,
) -> Result<Json<UnitView>, ApiError> {
    let key: SliceKey = parse_path(&key)?;
    Ok(Json(state.coordinator.get_state(&key, &unit).await?))
}

/// GET /slices/{key}/stream: server-sent snapshots of the slice.
///
/// The first event is the current snapshot; every commit sends another.
/// Dropped upstream subscriptions are reopened with backoff.
pub async fn stream<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(key): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let key: SliceKey = parse_path(&key)?;
    // Surface a dead store as 503 before the response starts.
    state.coordinator.get_slice(&key).await?;

    tracing::info!(slice = %key, "live stream opened");
    let snapshots = ReconnectingSubscription::new(
        Arc::clone(&state.coordinator),
        key,
        state.backoff.clone(),
    )
    .into_stream();

    let events = snapshots.take_until(state.shutting_down()).map(|snapshot| {
        Event::default()
            .event("snapshot")
            .id(snapshot.version.as_i64().to_string())
            .json_data(snapshot.as_ref())
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// POST /slices/{key}/allocate: applies one transition to listed units.
pub async fn allocate<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(key): Path<String>,
    Json(req): Json<AllocateRequest>,
) -> Result<Json<AllocationOutcome>, ApiError> {
    let key: SliceKey = parse_path(&key)?;
    let transition = req.transition()?;

    let outcome = state
        .coordinator
        .allocate_with_policy(&key, &req.unit_ids, transition, &actor, req.policy)
        .await?;
    Ok(Json(outcome))
}

/// POST /slices/{key}/bulk: admin block or unblock over a selection.
pub async fn bulk<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(key): Path<String>,
    Json(req): Json<BulkRequest>,
) -> Result<Json<BulkOutcome>, ApiError> {
    let key: SliceKey = parse_path(&key)?;
    let outcome = state
        .bulk
        .execute(&key, req.selection, req.action, &actor)
        .await?;
    Ok(Json(outcome))
}

/// POST /slices/{key}/migrate: rewrites legacy unit ids to canonical form.
pub async fn migrate<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(key): Path<String>,
) -> Result<Json<MigrationReport>, ApiError> {
    let key: SliceKey = parse_path(&key)?;
    Ok(Json(state.coordinator.migrate_legacy_ids(&key, &actor).await?))
}

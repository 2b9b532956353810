//! Cancellation listing, refund report and refund recording.

use std::sync::Arc;

use allocation::{Operation, authorize};
use axum::Json;
use axum::extract::{Path, Query, State};
use common::CancellationId;
use domain::{CancellationRecord, RefundInput};
use event_store::EventStore;
use projections::{CancellationFilter, CancellationReport};

use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /cancellations?refund_status=&slice_key=&cancelled_from=&cancelled_to=
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Query(filter): Query<CancellationFilter>,
) -> Result<Json<Vec<CancellationRecord>>, ApiError> {
    authorize(&actor, Operation::ViewRecords)?;
    Ok(Json(state.reconciler.list_cancellations(&filter).await?))
}

/// GET /cancellations/report
pub async fn report<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<CancellationReport>, ApiError> {
    authorize(&actor, Operation::ViewRecords)?;
    Ok(Json(state.reconciler.report().await?))
}

/// POST /cancellations/{id}/refund: records the refund, once.
pub async fn refund<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<CancellationId>,
    Json(input): Json<RefundInput>,
) -> Result<Json<CancellationRecord>, ApiError> {
    Ok(Json(
        state.reconciler.record_refund(id, input, &actor).await?,
    ))
}

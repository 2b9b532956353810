//! Manual reconciliation trigger.

use std::sync::Arc;

use allocation::SweepReport;
use axum::Json;
use axum::extract::State;
use event_store::EventStore;

use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /reconciliation/sweep: runs one sweep now, outside the schedule.
pub async fn sweep<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<SweepReport>, ApiError> {
    Ok(Json(state.reconciler.sweep(&actor).await?))
}

//! Activity log endpoint.

use std::sync::Arc;

use allocation::{Operation, authorize};
use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use event_store::{EventCursor, EventId, EventStore};
use projections::ActivityPage;
use serde::Deserialize;
use uuid::Uuid;

use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub before_ts: Option<DateTime<Utc>>,
    pub before_id: Option<Uuid>,
    pub limit: Option<usize>,
}

impl ActivityQuery {
    fn cursor(&self) -> Result<Option<EventCursor>, ApiError> {
        match (self.before_ts, self.before_id) {
            (Some(timestamp), Some(id)) => Ok(Some(EventCursor {
                timestamp,
                event_id: EventId::from_uuid(id),
            })),
            (None, None) => Ok(None),
            _ => Err(ApiError::BadRequest(
                "before_ts and before_id must be given together".to_string(),
            )),
        }
    }
}

/// GET /activity: audited operations, newest first.
///
/// Pass the `next` cursor of a page back as `before_ts`/`before_id` to fetch
/// the page after it.
pub async fn page<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<ActivityPage>, ApiError> {
    authorize(&actor, Operation::ViewRecords)?;
    let cursor = query.cursor()?;
    let page = state
        .activity
        .page(cursor, query.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .await?;
    Ok(Json(page))
}

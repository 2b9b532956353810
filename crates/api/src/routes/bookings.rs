//! Booking checkout and cancellation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{BookingId, SliceKey};
use domain::{BookingRecord, CancellationRecord, CustomerInfo, PaymentInfo};
use event_store::EventStore;
use serde::Deserialize;

use crate::actor::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub slice_key: SliceKey,
    pub unit_ids: Vec<String>,
    pub customer: CustomerInfo,
    pub payment: PaymentInfo,
}

#[derive(Deserialize, Default)]
pub struct CancelBookingRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /bookings: places a booking and claims its units.
///
/// Any unit lost to another booking fails the whole request with 409; the
/// booking then stays pending and holds nothing.
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingRecord>), ApiError> {
    let booking = state
        .checkout
        .place(&req.slice_key, &req.unit_ids, req.customer, req.payment, &actor)
        .await?;

    tracing::info!(booking_id = %booking.id, units = booking.unit_ids.len(), "booking confirmed via API");
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /bookings/{id}
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<BookingId>,
) -> Result<Json<BookingRecord>, ApiError> {
    Ok(Json(state.reconciler.get_booking(id).await?))
}

/// POST /bookings/{id}/cancel: cancels a confirmed booking.
///
/// Returns the pending cancellation the refund is later recorded against.
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<BookingId>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<(StatusCode, Json<CancellationRecord>), ApiError> {
    let cancellation = state
        .reconciler
        .cancel_booking(id, &actor, req.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(cancellation)))
}

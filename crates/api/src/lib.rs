//! HTTP API server for slice inventory allocation.
//!
//! Exposes layouts, slice availability with a live SSE stream, allocation,
//! bulk admin actions, checkout, cancellation/refund reconciliation and the
//! activity log, with structured logging (tracing) and Prometheus metrics.

pub mod actor;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, create_default_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/layouts/{kind}",
            get(routes::layouts::get::<S>).put(routes::layouts::replace::<S>),
        )
        .route("/slices/{key}", get(routes::slices::get::<S>))
        .route("/slices/{key}/units/{unit}", get(routes::slices::unit::<S>))
        .route("/slices/{key}/stream", get(routes::slices::stream::<S>))
        .route("/slices/{key}/allocate", post(routes::slices::allocate::<S>))
        .route("/slices/{key}/bulk", post(routes::slices::bulk::<S>))
        .route("/slices/{key}/migrate", post(routes::slices::migrate::<S>))
        .route("/bookings", post(routes::bookings::create::<S>))
        .route("/bookings/{id}", get(routes::bookings::get::<S>))
        .route("/bookings/{id}/cancel", post(routes::bookings::cancel::<S>))
        .route("/cancellations", get(routes::cancellations::list::<S>))
        .route("/cancellations/report", get(routes::cancellations::report::<S>))
        .route(
            "/cancellations/{id}/refund",
            post(routes::cancellations::refund::<S>),
        )
        .route("/activity", get(routes::activity::page::<S>))
        .route(
            "/reconciliation/sweep",
            post(routes::reconciliation::sweep::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
}

/// Runs a reconciliation sweep every `period` until the task is aborted.
pub fn spawn_sweeper<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    period: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let actor = common::Actor::system("sweep");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            metrics::counter!("reconciliation_sweeps_total").increment(1);
            match state.reconciler.sweep(&actor).await {
                Ok(report) if report.units_released > 0 || report.cancellations_opened > 0 => {
                    tracing::info!(?report, "reconciliation sweep repaired state");
                }
                Ok(_) => tracing::debug!("reconciliation sweep found nothing"),
                Err(err) => tracing::warn!(error = %err, "reconciliation sweep failed"),
            }
        }
    })
}

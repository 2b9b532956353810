//! HTTP route handlers.

pub mod activity;
pub mod bookings;
pub mod cancellations;
pub mod health;
pub mod layouts;
pub mod metrics;
pub mod reconciliation;
pub mod slices;

use std::fmt::Display;
use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path segment, rejecting it as a bad request.
fn parse_path<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e: T::Err| ApiError::BadRequest(e.to_string()))
}

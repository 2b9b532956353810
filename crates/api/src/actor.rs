//! Actor extraction from gateway headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{Actor, ActorRole};

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_NAME_HEADER: &str = "x-actor-name";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The caller, as authenticated by the upstream gateway.
///
/// `x-actor-id` and `x-actor-role` are required; `x-actor-name` defaults to
/// the id.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let id = header(ACTOR_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {ACTOR_ID_HEADER} header")))?;
        let role: ActorRole = header(ACTOR_ROLE_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {ACTOR_ROLE_HEADER} header")))?
            .parse()
            .map_err(|e: common::ParseRoleError| ApiError::Unauthorized(e.to_string()))?;
        let name = header(ACTOR_NAME_HEADER).unwrap_or(id);

        Ok(Self(Actor::new(id, name, role)))
    }
}

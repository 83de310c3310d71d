//! Actor identity extraction.
//!
//! Authentication lives in a fronting layer; requests arrive here with the
//! authenticated actor's id in the `X-Actor-Id` header. The capability
//! check itself (`can_manage`) stays in this service.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sortia_core::error::CoreError;
use sortia_core::types::DbId;

use crate::error::AppError;

/// Header carrying the authenticated actor id.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// The authenticated actor, extracted from `X-Actor-Id`.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: DbId,
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing X-Actor-Id header".to_string(),
                ))
            })?;

        let user_id: DbId = header
            .to_str()
            .ok()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "X-Actor-Id header is not a valid id".to_string(),
                ))
            })?;

        Ok(Actor { user_id })
    }
}

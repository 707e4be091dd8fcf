use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{errors::AppError, models::app_state::AppState};

/// Profile id of the bearer token holder, set by [`auth_middleware`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentProfile(pub Uuid);

impl CurrentProfile {
    /// Reject unless the caller is acting on their own profile
    pub fn ensure(&self, profile_id: Uuid) -> Result<(), AppError> {
        if self.0 == profile_id {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

/// Verify the `Authorization: Bearer` JWT and attach the caller's profile id.
/// Tokens of deleted profiles are rejected.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let profile_id = state.tokens.verify(token)?;

    if state.profiles.find_by_id(profile_id).await?.is_empty() {
        return Err(AppError::InvalidToken);
    }

    req.extensions_mut().insert(CurrentProfile(profile_id));

    Ok(next.run(req).await)
}

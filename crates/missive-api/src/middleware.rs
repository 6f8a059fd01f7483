use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{error, warn};

use missive_db::models::SessionRow;
use missive_types::api::Claims;

use crate::auth::{AppState, AppStateInner, SESSION_COOKIE, blocking};
use crate::error::ApiError;

/// Gate for the message routes.
///
/// A request must carry an `authorization` header (missing: 403) whose
/// token equals the one stored on the caller's live session (otherwise:
/// 401). The verified claims are attached to the request for handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().map(str::to_owned));

    let presented = match header_value {
        None => {
            error!("Missing authorization header");
            return Err(ApiError::Forbidden);
        }
        Some(Err(_)) => {
            warn!("Authorization header is not valid ASCII");
            return Err(ApiError::Unauthorized);
        }
        Some(Ok(value)) if value.is_empty() => {
            error!("Missing authorization header");
            return Err(ApiError::Forbidden);
        }
        Some(Ok(value)) => bearer_token(&value).to_owned(),
    };

    let session_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned());
    let lookup_state = state.clone();
    let session = blocking(move || live_session(&lookup_state, session_id.as_deref())).await?;
    let Some(session) = session else {
        warn!("Authorization header presented without a live session");
        return Err(ApiError::Unauthorized);
    };

    if session.token != presented {
        warn!("Session token didn't match authorization header for session {}", session.id);
        return Err(ApiError::Unauthorized);
    }

    let claims = decode::<Claims>(
        &presented,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!("Session token failed verification: {}", e);
        ApiError::Unauthorized
    })?
    .claims;

    let touch_state = state.clone();
    blocking(move || {
        Ok(touch_state
            .db
            .touch_session(&session.id, chrono::Utc::now().timestamp())?)
    })
    .await?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Strip an optional, case-insensitive `Bearer ` prefix.
pub fn bearer_token(value: &str) -> &str {
    match value.split_at_checked(7) {
        Some((prefix, rest)) if prefix.eq_ignore_ascii_case("bearer ") => rest,
        _ => value,
    }
}

/// Session named by the request's cookie, if it exists and has neither
/// expired nor gone idle.
fn live_session(state: &AppStateInner, session_id: Option<&str>) -> Result<Option<SessionRow>, ApiError> {
    let Some(session_id) = session_id else {
        return Ok(None);
    };
    let Some(session) = state.db.get_session(session_id)? else {
        return Ok(None);
    };

    let now = chrono::Utc::now().timestamp();
    if !session.is_live(now, state.sessions.idle_timeout_secs) {
        return Ok(None);
    }
    Ok(Some(session))
}

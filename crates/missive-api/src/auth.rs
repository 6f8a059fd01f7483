use std::sync::Arc;

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info, warn};
use uuid::Uuid;

use missive_db::models::SessionRow;
use missive_db::{Database, MessageReader, MessageWriter, Registry};
use missive_types::api::{Claims, CreateUserRequest, CreateUserResponse, LoginRequest, LoginResponse};

use crate::error::ApiError;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session";

const MAX_USERNAME_LEN: usize = 32;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub writer: MessageWriter,
    pub reader: MessageReader,
    pub sessions: SessionPolicy,
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        registry: Arc<dyn Registry>,
        sessions: SessionPolicy,
        jwt_secret: String,
    ) -> Self {
        Self {
            writer: MessageWriter::new(db.clone(), registry),
            reader: MessageReader::new(db.clone()),
            db,
            sessions,
            jwt_secret,
        }
    }
}

/// How long sessions stay valid, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub lifetime_secs: i64,
    pub idle_timeout_secs: i64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            lifetime_secs: 12 * 60 * 60,
            idle_timeout_secs: 3 * 60 * 60,
        }
    }
}

/// Run store or hashing work off the async workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Store(e.into())
    })?
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.is_empty() || req.username.len() > MAX_USERNAME_LEN {
        return Err(ApiError::Validation(format!(
            "username must be 1-{} bytes",
            MAX_USERNAME_LEN
        )));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("password must not be empty".into()));
    }

    let db = state.db.clone();
    let username = req.username.clone();
    let id = blocking(move || {
        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| anyhow!("password hashing failed: {}", e))?
            .to_string();

        Ok(db.create_user(&req.username, &password_hash)?)
    })
    .await?
    .ok_or_else(|| ApiError::Conflict(format!("username {:?} is taken", username)))?;

    info!("User {} created with id {}", username, id);
    Ok((StatusCode::CREATED, Json(CreateUserResponse { id })))
}

/// Verify credentials, open a session and hand back its bearer token. The
/// session id travels in the `session` cookie; the guard requires both.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user_id, session_id, token) = blocking(move || {
        let Some(user) = state.db.get_user_by_username(&req.username)? else {
            warn!("Login for unknown user {}", req.username);
            return Err(ApiError::Unauthorized);
        };

        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| anyhow!("stored hash is invalid: {}", e))?;

        if Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .is_err()
        {
            warn!("Failed login for {}", user.username);
            return Err(ApiError::Unauthorized);
        }

        let now = chrono::Utc::now().timestamp();
        let session_id = Uuid::new_v4().to_string();
        let expires_at = now + state.sessions.lifetime_secs;
        let token = create_token(&state.jwt_secret, user.id, &user.username, &session_id, expires_at)?;

        state.db.create_session(&SessionRow {
            id: session_id.clone(),
            user_id: user.id,
            token: token.clone(),
            created_at: now,
            last_seen_at: now,
            expires_at,
        })?;

        info!("User {} logged in", user.username);
        Ok((user.id, session_id, token))
    })
    .await?;

    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok((jar.add(cookie), Json(LoginResponse { id: user_id, token })))
}

fn create_token(
    secret: &str,
    user_id: i64,
    username: &str,
    session_id: &str,
    expires_at: i64,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        sid: session_id.to_string(),
        exp: usize::try_from(expires_at)?,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

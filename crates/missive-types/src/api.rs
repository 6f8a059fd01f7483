use serde::{Deserialize, Serialize};

use crate::models::{ContentFields, Message};

// -- Session token claims --

/// Claims carried by the bearer token issued at login. The token itself is
/// also stored on the session, so the guard checks both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    /// Session id the token was issued for.
    pub sid: String,
    pub exp: usize,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub id: i64,
    pub token: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub sender: i64,
    pub recipient: i64,
    pub content: ContentFields,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMessageResponse {
    pub id: i64,
    /// RFC 3339, UTC, seconds precision.
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub recipient: i64,
    #[serde(default)]
    pub start: i64,
    /// 0 or absent selects the default page size.
    #[serde(default)]
    pub limit: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListMessagesResponse {
    pub messages: Vec<Message>,
}

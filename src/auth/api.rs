//! Authentication API Endpoints
//! Mission: Provide login and user management endpoints

use crate::auth::{
    jwt::JwtHandler,
    models::{Claims, CreateUserRequest, LoginRequest, LoginResponse, UserResponse, UserRole},
    user_store::UserStore,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub jwt_handler: Arc<JwtHandler>,
}

impl AuthState {
    pub fn new(user_store: Arc<UserStore>, jwt_handler: Arc<JwtHandler>) -> Self {
        Self {
            user_store,
            jwt_handler,
        }
    }
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    info!("🔐 Login attempt: {}", payload.username);

    // Verify credentials
    let valid = state
        .user_store
        .verify_password(&payload.username, &payload.password)
        .map_err(|_| AuthApiError::InternalError)?;

    if !valid {
        warn!("❌ Failed login attempt: {}", payload.username);
        return Err(AuthApiError::InvalidCredentials);
    }

    // Get user details
    let user = state
        .user_store
        .get_user_by_username(&payload.username)
        .map_err(|_| AuthApiError::InternalError)?
        .ok_or(AuthApiError::InvalidCredentials)?;

    // Generate JWT token
    let (token, expires_in) = state
        .jwt_handler
        .generate_token(&user)
        .map_err(|_| AuthApiError::InternalError)?;

    info!(
        "✅ Login successful: {} ({})",
        user.username,
        user.role.as_str()
    );

    Ok(Json(LoginResponse {
        token,
        expires_in,
        role: user.role.clone(),
        user: UserResponse::from_user(&user),
    }))
}

/// Current user endpoint - GET /api/auth/me (behind auth middleware)
pub async fn get_current_user(Extension(claims): Extension<Claims>) -> Json<Claims> {
    Json(claims)
}

/// Create account endpoint - POST /api/auth/users (master only)
pub async fn create_user(
    State(state): State<AuthState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthApiError> {
    if claims.role != UserRole::Master {
        return Err(AuthApiError::Forbidden);
    }

    let user = state
        .user_store
        .create_user(
            &payload.username,
            &payload.password,
            payload.role,
            payload.tournament_id.as_deref(),
        )
        .map_err(|e| AuthApiError::BadRequest(e.to_string()))?;

    Ok((StatusCode::CREATED, Json(UserResponse::from_user(&user))))
}

/// List accounts endpoint - GET /api/auth/users (master only)
pub async fn list_users(
    State(state): State<AuthState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<UserResponse>>, AuthApiError> {
    if claims.role != UserRole::Master {
        return Err(AuthApiError::Forbidden);
    }

    let users = state
        .user_store
        .list_users()
        .map_err(|_| AuthApiError::InternalError)?;

    Ok(Json(users.iter().map(UserResponse::from_user).collect()))
}

/// Delete account endpoint - DELETE /api/auth/users/:id (master only)
pub async fn delete_user(
    State(state): State<AuthState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AuthApiError> {
    if claims.role != UserRole::Master {
        return Err(AuthApiError::Forbidden);
    }

    state
        .user_store
        .delete_user(&user_id)
        .map_err(|_| AuthApiError::NotFound)?;

    Ok(Json(json!({ "ok": true })))
}

/// Auth API error types
#[derive(Debug)]
pub enum AuthApiError {
    InvalidCredentials,
    Forbidden,
    BadRequest(String),
    NotFound,
    InternalError,
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid username or password".to_string())
            }
            AuthApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Only the master account may do this".to_string(),
            ),
            AuthApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthApiError::NotFound => (StatusCode::NOT_FOUND, "User not found".to_string()),
            AuthApiError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

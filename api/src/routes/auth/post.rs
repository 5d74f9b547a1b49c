use axum::{Form, Json, extract::State, http::StatusCode, response::IntoResponse};
use common::format_validation_errors;
use db::models::user::{Model as User, UserRole};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::AuthUserPayload;
use crate::auth::{TOKEN_TYPE_REFRESH, TokenPair, decode_token, generate_token_pair};
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,

    pub role: Option<String>,
}

/// User plus a fresh token pair, returned on register and login.
#[derive(Debug, Serialize, Default)]
pub struct AuthTokenResponse {
    pub user: AuthUserPayload,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl AuthTokenResponse {
    fn new(user: &User, pair: TokenPair) -> Self {
        Self {
            user: AuthUserPayload::from_user(user),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type,
        }
    }
}

/// POST /auth/register
///
/// Register a new account. The role defaults to `student` when omitted.
///
/// ### Request Body
/// ```json
/// {
///   "email": "ana@example.com",
///   "password": "strongpassword",
///   "full_name": "Ana Torres",
///   "role": "student"
/// }
/// ```
///
/// ### Responses
///
/// - `201 Created`
/// ```json
/// {
///   "success": true,
///   "data": {
///     "user": {
///       "id": 1,
///       "email": "ana@example.com",
///       "full_name": "Ana Torres",
///       "role": "student",
///       "roles": ["student"],
///       "is_active": true
///     },
///     "access_token": "jwt_here",
///     "refresh_token": "jwt_here",
///     "token_type": "bearer"
///   },
///   "message": "User registered successfully"
/// }
/// ```
///
/// - `400 Bad Request` (validation failure)
/// ```json
/// {
///   "success": false,
///   "message": "Password must be at least 8 characters"
/// }
/// ```
///
/// - `409 Conflict` (duplicate email)
/// ```json
/// {
///   "success": false,
///   "message": "A user with this email already exists"
/// }
/// ```
pub async fn register(
    State(app_state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    if let Err(validation_errors) = req.validate() {
        let error_message = format_validation_errors(&validation_errors);
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<AuthTokenResponse>::error(error_message)),
        )
            .into_response();
    }

    let role = match req.role.as_deref() {
        None => UserRole::Student,
        Some(raw) => match raw.parse::<UserRole>() {
            Ok(role) => role,
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::<AuthTokenResponse>::error(
                        "Role must be either student or teacher",
                    )),
                )
                    .into_response();
            }
        },
    };

    let db = app_state.db();

    match User::find_by_email(db, &req.email).await {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::<AuthTokenResponse>::error(
                    "A user with this email already exists",
                )),
            )
                .into_response();
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, "register: email lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<AuthTokenResponse>::error(
                    "Failed to register user",
                )),
            )
                .into_response();
        }
    }

    match User::create(db, &req.email, &req.password, &req.full_name, role).await {
        Ok(user) => {
            let pair = generate_token_pair(user.id, &user.role.to_string());
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(
                    AuthTokenResponse::new(&user, pair),
                    "User registered successfully",
                )),
            )
                .into_response()
        }
        Err(e) => {
            if e.to_string().contains("UNIQUE constraint failed: users.email") {
                return (
                    StatusCode::CONFLICT,
                    Json(ApiResponse::<AuthTokenResponse>::error(
                        "A user with this email already exists",
                    )),
                )
                    .into_response();
            }
            tracing::error!(error = %e, "register: insert failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<AuthTokenResponse>::error(
                    "Failed to register user",
                )),
            )
                .into_response()
        }
    }
}

/// Form-encoded login request, `username` holding the email.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

/// POST /auth/token
///
/// Authenticate with a form-encoded `username` (the email) and `password`,
/// OAuth2 password-flow style.
///
/// ### Responses
///
/// - `200 OK` (same shape as register)
/// - `401 Unauthorized`
/// ```json
/// {
///   "success": false,
///   "message": "Incorrect email or password"
/// }
/// ```
pub async fn token(
    State(app_state): State<AppState>,
    Form(req): Form<TokenRequest>,
) -> impl IntoResponse {
    match User::verify_credentials(app_state.db(), &req.username, &req.password).await {
        Ok(Some(user)) => {
            let pair = generate_token_pair(user.id, &user.role.to_string());
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    AuthTokenResponse::new(&user, pair),
                    "Login successful",
                )),
            )
                .into_response()
        }
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<AuthTokenResponse>::error(
                "Incorrect email or password",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "login: credential check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<AuthTokenResponse>::error("Failed to log in")),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /auth/refresh
///
/// Exchange a valid refresh token for a complete new token pair. Access
/// tokens are rejected here; only `type: "refresh"` tokens are accepted.
///
/// ### Responses
///
/// - `200 OK`
/// ```json
/// {
///   "success": true,
///   "data": {
///     "access_token": "jwt_here",
///     "refresh_token": "jwt_here",
///     "token_type": "bearer"
///   },
///   "message": "Token refreshed successfully"
/// }
/// ```
///
/// - `401 Unauthorized` (expired/invalid token, or an access token was sent)
pub async fn refresh(
    State(app_state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> impl IntoResponse {
    let claims = match decode_token(&req.refresh_token) {
        Ok(claims) => claims,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::<TokenPair>::error("Invalid refresh token")),
            )
                .into_response();
        }
    };

    if claims.token_type != TOKEN_TYPE_REFRESH {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<TokenPair>::error("Refresh token required")),
        )
            .into_response();
    }

    match db::models::user::Entity::find_by_id(claims.sub)
        .one(app_state.db())
        .await
    {
        Ok(Some(user)) if user.is_active => {
            let pair = generate_token_pair(user.id, &user.role.to_string());
            (
                StatusCode::OK,
                Json(ApiResponse::success(pair, "Token refreshed successfully")),
            )
                .into_response()
        }
        Ok(_) => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<TokenPair>::error("Invalid refresh token")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "refresh: user lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<TokenPair>::error("Failed to refresh token")),
            )
                .into_response()
        }
    }
}

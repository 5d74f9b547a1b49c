use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use axum_extra::extract::TypedHeader;
use headers::{Authorization, authorization::Bearer};

use crate::auth::claims::AuthUser;
use crate::auth::{TOKEN_TYPE_ACCESS, decode_token};

/// Extracts an authenticated user from the `Authorization: Bearer` header.
///
/// Verifies the JWT signature and expiry and requires an access-type token;
/// refresh tokens are only accepted by the refresh endpoint.
///
/// # Errors
/// Returns `401 Unauthorized` if the header is missing or malformed, the
/// token is invalid or expired, or a refresh token is presented.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    (
                        StatusCode::UNAUTHORIZED,
                        "Missing or invalid Authorization header",
                    )
                })?;

        let claims = decode_token(bearer.token())
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;

        if claims.token_type != TOKEN_TYPE_ACCESS {
            return Err((StatusCode::UNAUTHORIZED, "Access token required"));
        }

        Ok(AuthUser(claims))
    }
}

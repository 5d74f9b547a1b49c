pub mod claims;
pub mod extractors;
pub mod guards;
pub mod middleware;

pub use claims::{AuthUser, Claims};

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use util::config::AppConfig;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// Access/refresh token pair issued on register, login and refresh.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl Default for TokenPair {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            refresh_token: String::new(),
            token_type: "bearer".to_string(),
        }
    }
}

/// Generates a short-lived access token and a long-lived refresh token for a
/// user. Lifetimes come from `JWT_DURATION_MINUTES` and
/// `REFRESH_DURATION_DAYS`.
pub fn generate_token_pair(user_id: i64, role: &str) -> TokenPair {
    let config = AppConfig::global();
    let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());

    let access_exp = Utc::now() + Duration::minutes(config.jwt_duration_minutes as i64);
    let refresh_exp = Utc::now() + Duration::days(config.refresh_duration_days as i64);

    let access_token = encode(
        &Header::default(),
        &Claims {
            sub: user_id,
            exp: access_exp.timestamp() as usize,
            role: role.to_string(),
            token_type: TOKEN_TYPE_ACCESS.to_string(),
        },
        &encoding_key,
    )
    .expect("Token encoding failed");

    let refresh_token = encode(
        &Header::default(),
        &Claims {
            sub: user_id,
            exp: refresh_exp.timestamp() as usize,
            role: role.to_string(),
            token_type: TOKEN_TYPE_REFRESH.to_string(),
        },
        &encoding_key,
    )
    .expect("Token encoding failed");

    TokenPair {
        access_token,
        refresh_token,
        token_type: "bearer".to_string(),
    }
}

/// Decodes and verifies any token issued by this server. Callers check the
/// `token_type` claim themselves.
pub fn decode_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let config = AppConfig::global();
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set_test_config() {
        AppConfig::set_jwt_secret("unit-test-secret");
    }

    #[test]
    #[serial]
    fn pair_carries_distinct_token_types() {
        unsafe {
            std::env::set_var("DATABASE_PATH", "data/test.db");
            std::env::set_var("STORAGE_ROOT", "data/storage");
            std::env::set_var("JWT_SECRET", "unit-test-secret");
        }
        set_test_config();

        let pair = generate_token_pair(42, "teacher");
        assert_eq!(pair.token_type, "bearer");

        let access = decode_token(&pair.access_token).unwrap();
        assert_eq!(access.sub, 42);
        assert_eq!(access.role, "teacher");
        assert_eq!(access.token_type, TOKEN_TYPE_ACCESS);

        let refresh = decode_token(&pair.refresh_token).unwrap();
        assert_eq!(refresh.token_type, TOKEN_TYPE_REFRESH);
        assert!(refresh.exp > access.exp);
    }

    #[test]
    #[serial]
    fn tampered_tokens_are_rejected() {
        unsafe {
            std::env::set_var("DATABASE_PATH", "data/test.db");
            std::env::set_var("STORAGE_ROOT", "data/storage");
            std::env::set_var("JWT_SECRET", "unit-test-secret");
        }
        set_test_config();

        let pair = generate_token_pair(1, "student");
        let mut broken = pair.access_token.clone();
        broken.push('x');
        assert!(decode_token(&broken).is_err());
    }
}

use serde::{Deserialize, Serialize};

/// JWT claims carried by every issued token.
///
/// `token_type` distinguishes access tokens from refresh tokens: the request
/// extractor only accepts `access`, and the refresh endpoint only accepts
/// `refresh`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64,
    pub exp: usize,
    pub role: String,
    #[serde(rename = "type")]
    pub token_type: String,
}

impl Claims {
    pub fn is_teacher(&self) -> bool {
        self.role == "teacher"
    }

    pub fn is_student(&self) -> bool {
        self.role == "student"
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

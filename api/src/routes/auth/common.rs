use db::models::user;
use serde::Serialize;

/// Principal payload returned by the auth endpoints.
///
/// Exposes the role both as a scalar `role` and as a `roles` list; older
/// clients read one or the other.
#[derive(Debug, Serialize, Default)]
pub struct AuthUserPayload {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub roles: Vec<String>,
    pub is_active: bool,
}

impl AuthUserPayload {
    pub fn from_user(u: &user::Model) -> Self {
        Self::from_parts(
            u.id,
            u.email.clone(),
            u.full_name.clone(),
            Some(u.role.to_string()),
            None,
            u.is_active,
        )
    }

    /// Builds the payload from whatever role information is available.
    ///
    /// Missing values fall back exhaustively: no role and no list means
    /// `student`; a list without a scalar promotes its first entry; a scalar
    /// without a list becomes a single-element list.
    pub fn from_parts(
        id: i64,
        email: String,
        full_name: String,
        role: Option<String>,
        roles: Option<Vec<String>>,
        is_active: bool,
    ) -> Self {
        let roles = roles.filter(|r| !r.is_empty());
        let role = role
            .or_else(|| roles.as_ref().and_then(|r| r.first().cloned()))
            .unwrap_or_else(|| "student".to_string());
        let roles = roles.unwrap_or_else(|| vec![role.clone()]);

        Self {
            id,
            email,
            full_name,
            role,
            roles,
            is_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_input_defaults_to_student() {
        let payload = AuthUserPayload::from_parts(
            1,
            "a@example.com".into(),
            "A".into(),
            None,
            None,
            true,
        );
        assert_eq!(payload.role, "student");
        assert_eq!(payload.roles, vec!["student".to_string()]);
    }

    #[test]
    fn complete_input_is_kept_as_is() {
        let payload = AuthUserPayload::from_parts(
            2,
            "b@example.com".into(),
            "B".into(),
            Some("teacher".into()),
            Some(vec!["teacher".into(), "student".into()]),
            true,
        );
        assert_eq!(payload.role, "teacher");
        assert_eq!(
            payload.roles,
            vec!["teacher".to_string(), "student".to_string()]
        );
    }

    #[test]
    fn scalar_role_becomes_single_element_list() {
        let payload = AuthUserPayload::from_parts(
            3,
            "c@example.com".into(),
            "C".into(),
            Some("teacher".into()),
            None,
            true,
        );
        assert_eq!(payload.roles, vec!["teacher".to_string()]);
    }

    #[test]
    fn list_without_scalar_promotes_first_entry() {
        let payload = AuthUserPayload::from_parts(
            4,
            "d@example.com".into(),
            "D".into(),
            None,
            Some(vec!["teacher".into()]),
            true,
        );
        assert_eq!(payload.role, "teacher");
    }
}

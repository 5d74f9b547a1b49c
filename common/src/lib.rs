use validator::ValidationErrors;

pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| {
            errs.iter()
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(email(message = "Invalid email format"))]
        email: String,
        #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
        password: String,
    }

    #[test]
    fn collects_all_field_messages() {
        let sample = Sample {
            email: "not-an-email".into(),
            password: "short".into(),
        };
        let errors = sample.validate().unwrap_err();
        let message = format_validation_errors(&errors);
        assert!(message.contains("Invalid email format"));
        assert!(message.contains("Password must be at least 8 characters"));
    }

    #[test]
    fn empty_errors_produce_empty_string() {
        let errors = ValidationErrors::new();
        assert_eq!(format_validation_errors(&errors), "");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{IdDocumentType, Identity, Profile};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 50, message = "First name must be 2-50 characters"))]
    #[schema(example = "Ana")]
    pub first_name: String,

    #[validate(length(min = 2, max = 50, message = "Last name must be 2-50 characters"))]
    #[schema(example = "Gomez")]
    pub last_name: String,

    pub document_type: IdDocumentType,

    #[validate(length(min = 5, max = 20, message = "Document number must be 5-20 characters"))]
    #[schema(example = "1020304050")]
    pub document_number: String,

    #[serde(deserialize_with = "trimmed")]
    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "Email must be at most 255 characters")
    )]
    #[schema(example = "ana@example.com")]
    pub email: String,

    #[validate(length(min = 10, max = 20, message = "Phone number must be 10-20 characters"))]
    #[schema(example = "3001234567")]
    pub phone_number: String,

    #[validate(length(min = 10, max = 200, message = "Address must be 10-200 characters"))]
    #[schema(example = "Calle 10 # 20-30, Bogota")]
    pub address: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "password123", min_length = 8)]
    pub password: String,

    #[validate(length(max = 255))]
    pub facebook_profile: Option<String>,
    #[validate(length(max = 255))]
    pub instagram_profile: Option<String>,
    #[validate(length(max = 255))]
    pub twitter_profile: Option<String>,
    #[validate(length(max = 255))]
    pub linkedin_profile: Option<String>,
}

impl RegisterRequest {
    /// Splits the body into the profile and the raw password.
    pub fn into_parts(self) -> (Profile, String) {
        let profile = Profile {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            document_type: self.document_type,
            document_number: self.document_number,
            email: self.email,
            phone_number: self.phone_number.trim().to_string(),
            address: self.address.trim().to_string(),
            facebook_profile: non_blank(self.facebook_profile),
            instagram_profile: non_blank(self.instagram_profile),
            twitter_profile: non_blank(self.twitter_profile),
            linkedin_profile: non_blank(self.linkedin_profile),
        };
        (profile, self.password)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Surrounding whitespace is dropped before any validation rule runs.
fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ana@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "password123")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: Identity,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RegisterRequest {
        serde_json::from_value(serde_json::json!({
            "first_name": "Ana",
            "last_name": "Gomez",
            "document_type": "cedula",
            "document_number": "1020304050",
            "email": "ana@example.com",
            "phone_number": "3001234567",
            "address": "Calle 10 # 20-30",
            "password": "password123",
            "instagram_profile": "   "
        }))
        .unwrap()
    }

    #[test]
    fn accepts_valid_registration() {
        let request = valid();
        assert!(request.validate().is_ok());

        let (profile, password) = request.into_parts();
        assert_eq!(password, "password123");
        assert!(profile.instagram_profile.is_none());
    }

    #[test]
    fn rejects_short_fields() {
        let mut request = valid();
        request.password = "short".to_string();
        request.phone_number = "123".to_string();

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("phone_number"));
    }

    #[test]
    fn padded_email_is_trimmed_before_validation() {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "first_name": "Ana",
            "last_name": "Gomez",
            "document_type": "cedula",
            "document_number": "1020304050",
            "email": "  Ana@Example.com \t",
            "phone_number": "3001234567",
            "address": "Calle 10 # 20-30",
            "password": "password123"
        }))
        .unwrap();
        assert_eq!(request.email, "Ana@Example.com");
        assert!(request.validate().is_ok());

        let login: LoginRequest = serde_json::from_value(serde_json::json!({
            "email": " ana@example.com ",
            "password": "password123"
        }))
        .unwrap();
        assert_eq!(login.email, "ana@example.com");
        assert!(login.validate().is_ok());
    }

    #[test]
    fn rejects_email_longer_than_column() {
        let mut request = valid();
        let label = "a".repeat(50);
        request.email = format!("{}@{l}.{l}.{l}.{l}.com", "b".repeat(60), l = label);
        assert!(request.email.len() > 255);

        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn unknown_document_type_fails_to_parse() {
        let result = serde_json::from_value::<RegisterRequest>(serde_json::json!({
            "first_name": "Ana",
            "last_name": "Gomez",
            "document_type": "licencia",
            "document_number": "1020304050",
            "email": "ana@example.com",
            "phone_number": "3001234567",
            "address": "Calle 10 # 20-30",
            "password": "password123"
        }));
        assert!(result.is_err());
    }
}

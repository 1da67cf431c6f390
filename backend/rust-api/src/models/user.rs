use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Learner or staff account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Teacher,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &str {
        match self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
            UserRole::Admin => "admin",
        }
    }

    /// Admins and teachers manage questions and read other learners' analytics
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Teacher)
    }
}

/// User returned to clients (no password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserOut {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<User> for UserOut {
    fn from(user: User) -> Self {
        UserOut {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// At least one uppercase letter, one lowercase letter and one digit
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if has_upper && has_lower && has_digit {
        Ok(())
    } else {
        let mut err = ValidationError::new("weak_password");
        err.message = Some(
            "Password must contain an uppercase letter, a lowercase letter and a digit".into(),
        );
        Err(err)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(
        length(min = 8, message = "Password must be at least 8 characters"),
        custom(function = "validate_password_strength")
    )]
    pub password: String,

    /// Defaults to student
    pub role: Option<UserRole>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserOut,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub role: Option<UserRole>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub old_password: String,

    #[validate(
        length(min = 8, message = "New password must be at least 8 characters"),
        custom(function = "validate_password_strength")
    )]
    pub new_password: String,
}

/// User with a short activity summary
#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: UserOut,
    pub total_quizzes: u64,
    pub average_score: f64,
    pub total_questions_answered: u64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponse {
    pub users: Vec<UserOut>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_strength_requires_mixed_characters() {
        assert!(validate_password_strength("Secret123").is_ok());
        assert!(validate_password_strength("secret123").is_err());
        assert!(validate_password_strength("SECRET123").is_err());
        assert!(validate_password_strength("SecretPass").is_err());
    }

    #[test]
    fn register_request_validation() {
        let ok = RegisterRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "Secret123".to_string(),
            role: None,
        };
        assert!(ok.validate().is_ok());

        let short_name = RegisterRequest {
            name: "A".to_string(),
            ..ok
        };
        assert!(short_name.validate().is_err());
    }

    #[test]
    fn short_password_fails_even_when_mixed() {
        let req = RegisterRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "Ab1".to_string(),
            role: None,
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn user_out_drops_password_hash() {
        let user = User {
            id: "u1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            role: UserRole::Teacher,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        };
        let json = serde_json::to_value(UserOut::from(user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "teacher");
    }

    #[test]
    fn missing_is_active_defaults_to_true() {
        let raw = r#"{"id":"u1","name":"Ada","email":"a@b.co","password_hash":"x",
            "role":"student","created_at":"2024-01-01T00:00:00Z"}"#;
        let user: User = serde_json::from_str(raw).unwrap();
        assert!(user.is_active);
        assert!(user.updated_at.is_none());
    }
}

use crate::config::Config;
use crate::metrics::LOGIN_ATTEMPTS_TOTAL;
use crate::middlewares::auth::{JwtClaims, JwtService};
use crate::models::user::{
    ChangePasswordRequest, LoginRequest, RegisterRequest, RegisterResponse, TokenResponse,
    UpdateProfileRequest, UserListResponse, UserProfile,
};
use crate::models::{User, UserOut, UserRole};
use crate::services::{ServiceError, ServiceResult};
use crate::storage::QuizStore;
use anyhow::Context;
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

const BAD_CREDENTIALS: &str = "Incorrect email or password";

pub struct AuthService {
    store: Arc<dyn QuizStore>,
    jwt_service: JwtService,
    access_token_ttl: Duration,
    hash_cost: u32,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(store: Arc<dyn QuizStore>, jwt_service: JwtService, config: &Config) -> Self {
        Self {
            store,
            jwt_service,
            access_token_ttl: Duration::minutes(config.access_token_ttl_minutes),
            hash_cost: config.password_hash_cost,
        }
    }

    pub fn hash_password(&self, password: &str) -> anyhow::Result<String> {
        hash(password, self.hash_cost).context("Failed to hash password")
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> anyhow::Result<bool> {
        verify(password, hash).context("Failed to verify password")
    }

    /// Self-service registration. Admin accounts cannot be self-registered.
    pub async fn register(&self, req: RegisterRequest) -> ServiceResult<RegisterResponse> {
        let role = req.role.unwrap_or_default();
        if role == UserRole::Admin {
            return Err(ServiceError::Forbidden(
                "Admin accounts cannot be self-registered".to_string(),
            ));
        }

        let user = self
            .create_user(&req.name, &req.email, &req.password, role)
            .await?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "User registered");

        Ok(RegisterResponse {
            message: "User registered successfully".to_string(),
            user_id: user.id,
            email: user.email,
        })
    }

    /// Inserts a new account; the email must not be taken
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> ServiceResult<User> {
        let email = normalize_email(email);
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            email,
            password_hash: self.hash_password(password)?,
            role,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.store.insert_user(&user).await?;
        Ok(user)
    }

    pub async fn login(&self, req: LoginRequest) -> ServiceResult<TokenResponse> {
        let email = normalize_email(&req.email);
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["unknown_email"]).inc();
            tracing::warn!(email = %email, "Failed login attempt: unknown email");
            return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.to_string()));
        };

        if !self.verify_password(&req.password, &user.password_hash)? {
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["bad_password"]).inc();
            tracing::warn!(user_id = %user.id, "Failed login attempt: invalid password");
            return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.to_string()));
        }

        if !user.is_active {
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["inactive"]).inc();
            return Err(ServiceError::Forbidden("Inactive user".to_string()));
        }

        let access_token = self.issue_token(&user)?;
        LOGIN_ATTEMPTS_TOTAL.with_label_values(&["success"]).inc();
        tracing::info!(user_id = %user.id, "Successful login");

        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            user: user.into(),
        })
    }

    pub fn issue_token(&self, user: &User) -> ServiceResult<String> {
        let claims = JwtClaims::for_user(user, self.access_token_ttl);
        self.jwt_service
            .generate_token(&claims)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e)))
    }

    /// Account behind a token. Deleted accounts are 401, deactivated ones 403.
    pub async fn current_user(&self, user_id: &str) -> ServiceResult<User> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("User not found".to_string()))?;
        if !user.is_active {
            return Err(ServiceError::Forbidden("Inactive user".to_string()));
        }
        Ok(user)
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        req: UpdateProfileRequest,
    ) -> ServiceResult<UserOut> {
        if req.is_empty() {
            return Err(ServiceError::BadRequest("No fields to update".to_string()));
        }

        let mut user = self.current_user(user_id).await?;

        if let Some(role) = req.role {
            if role != user.role && user.role != UserRole::Admin {
                return Err(ServiceError::Forbidden(
                    "Only administrators can change roles".to_string(),
                ));
            }
            user.role = role;
        }

        if let Some(email) = req.email {
            let email = normalize_email(&email);
            if email != user.email {
                if self.store.find_user_by_email(&email).await?.is_some() {
                    return Err(ServiceError::Conflict(
                        "User with this email already exists".to_string(),
                    ));
                }
                user.email = email;
            }
        }

        if let Some(name) = req.name {
            user.name = name.trim().to_string();
        }

        user.updated_at = Some(Utc::now());
        self.store.update_user(&user).await?;
        Ok(user.into())
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        req: ChangePasswordRequest,
    ) -> ServiceResult<()> {
        let mut user = self.current_user(user_id).await?;
        if !self.verify_password(&req.old_password, &user.password_hash)? {
            return Err(ServiceError::BadRequest(
                "Incorrect current password".to_string(),
            ));
        }

        user.password_hash = self.hash_password(&req.new_password)?;
        user.updated_at = Some(Utc::now());
        self.store.update_user(&user).await?;
        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Account plus quiz/answer totals
    pub async fn profile(&self, user_id: &str) -> ServiceResult<UserProfile> {
        let user = self.current_user(user_id).await?;
        let total_quizzes = self.store.count_attempts(Some(user_id)).await?;
        let average_score = self.store.average_score(Some(user_id)).await?;
        let tally = self.store.answer_tally(Some(user_id)).await?;

        Ok(UserProfile {
            user: user.into(),
            total_quizzes,
            average_score,
            total_questions_answered: tally.total,
        })
    }

    pub async fn list_users(&self, skip: u64, limit: i64) -> ServiceResult<UserListResponse> {
        let users = self.store.list_users(skip, limit).await?;
        let total = self.store.count_users().await?;
        Ok(UserListResponse {
            users: users.into_iter().map(UserOut::from).collect(),
            total,
        })
    }

    pub async fn get_user(&self, user_id: &str) -> ServiceResult<UserOut> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .map(UserOut::from)
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    /// Activates or deactivates an account. Deactivated users cannot log in.
    pub async fn set_active(&self, user_id: &str, is_active: bool) -> ServiceResult<UserOut> {
        let mut user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        user.is_active = is_active;
        user.updated_at = Some(Utc::now());
        self.store.update_user(&user).await?;
        tracing::info!(user_id = %user.id, is_active, "User status changed");
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JsonFileStore;

    fn service() -> AuthService {
        let config = Config::with_json_store("unused");
        AuthService::new(
            Arc::new(JsonFileStore::in_memory()),
            JwtService::new(&config.jwt_secret),
            &config,
        )
    }

    fn register_request(email: &str, role: Option<UserRole>) -> RegisterRequest {
        RegisterRequest {
            name: "Ada Lovelace".to_string(),
            email: email.to_string(),
            password: "Secret123".to_string(),
            role,
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_password_hashing() {
        let service = service();
        let hash = service.hash_password("Secret123").unwrap();
        assert!(service.verify_password("Secret123", &hash).unwrap());
        assert!(!service.verify_password("Wrong123", &hash).unwrap());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let service = service();
        service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap();
        let err = service
            .register(register_request(" ADA@example.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn admin_cannot_self_register() {
        let err = service()
            .register(register_request("root@example.com", Some(UserRole::Admin)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn login_issues_bearer_token_with_user_claims() {
        let service = service();
        let registered = service
            .register(register_request("ada@example.com", Some(UserRole::Teacher)))
            .await
            .unwrap();

        let token = service
            .login(login_request("ada@example.com", "Secret123"))
            .await
            .unwrap();
        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.user.id, registered.user_id);

        let claims = JwtService::new("test-secret")
            .validate_token(&token.access_token)
            .unwrap();
        assert_eq!(claims.sub, registered.user_id);
        assert_eq!(claims.role, UserRole::Teacher);
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[tokio::test]
    async fn bad_credentials_share_one_message() {
        let service = service();
        service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap();

        for req in [
            login_request("ada@example.com", "Wrong1234"),
            login_request("nobody@example.com", "Secret123"),
        ] {
            match service.login(req).await.unwrap_err() {
                ServiceError::Unauthorized(message) => assert_eq!(message, BAD_CREDENTIALS),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn inactive_user_cannot_login() {
        let service = service();
        let registered = service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap();
        service.set_active(&registered.user_id, false).await.unwrap();

        let err = service
            .login(login_request("ada@example.com", "Secret123"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn students_cannot_promote_themselves() {
        let service = service();
        let registered = service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap();

        let err = service
            .update_profile(
                &registered.user_id,
                UpdateProfileRequest {
                    role: Some(UserRole::Teacher),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let empty = service
            .update_profile(&registered.user_id, UpdateProfileRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(empty, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn change_password_requires_the_old_one() {
        let service = service();
        let registered = service
            .register(register_request("ada@example.com", None))
            .await
            .unwrap();

        let wrong = service
            .change_password(
                &registered.user_id,
                ChangePasswordRequest {
                    old_password: "Nope12345".to_string(),
                    new_password: "Better456".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(wrong, ServiceError::BadRequest(_)));

        service
            .change_password(
                &registered.user_id,
                ChangePasswordRequest {
                    old_password: "Secret123".to_string(),
                    new_password: "Better456".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(service
            .login(login_request("ada@example.com", "Better456"))
            .await
            .is_ok());
    }
}

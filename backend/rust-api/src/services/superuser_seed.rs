use crate::config::AdminSeed;
use crate::models::UserRole;
use crate::services::auth_service::AuthService;
use crate::services::AppState;
use crate::storage::QuizStore;
use anyhow::{Context, Result};
use chrono::Utc;

#[derive(Debug, PartialEq, Eq)]
pub enum AdminBootstrap {
    Created { user_id: String },
    Promoted { user_id: String },
    AlreadyAdmin { user_id: String },
}

/// Makes sure the account for `seed.email` exists and is an active admin.
/// Existing accounts keep their password.
pub async fn ensure_admin(
    auth: &AuthService,
    store: &dyn QuizStore,
    seed: &AdminSeed,
) -> Result<AdminBootstrap> {
    let email = seed.email.trim().to_lowercase();

    if let Some(mut user) = store
        .find_user_by_email(&email)
        .await
        .context("Failed to look up admin account")?
    {
        if user.role == UserRole::Admin && user.is_active {
            return Ok(AdminBootstrap::AlreadyAdmin { user_id: user.id });
        }
        user.role = UserRole::Admin;
        user.is_active = true;
        user.updated_at = Some(Utc::now());
        store
            .update_user(&user)
            .await
            .context("Failed to promote admin account")?;
        return Ok(AdminBootstrap::Promoted { user_id: user.id });
    }

    let user = auth
        .create_user(&seed.name, &email, &seed.password, UserRole::Admin)
        .await
        .context("Failed to create admin account")?;
    Ok(AdminBootstrap::Created { user_id: user.id })
}

/// Startup hook: runs [`ensure_admin`] when an admin seed is configured
pub async fn bootstrap(state: &AppState) -> Result<()> {
    let Some(seed) = &state.config.admin_seed else {
        tracing::debug!("No admin seed configured, skipping bootstrap");
        return Ok(());
    };

    let auth = AuthService::new(state.store.clone(), state.jwt.clone(), &state.config);
    match ensure_admin(&auth, state.store.as_ref(), seed).await? {
        AdminBootstrap::Created { user_id } => {
            tracing::info!(%user_id, email = %seed.email, "Admin account created")
        }
        AdminBootstrap::Promoted { user_id } => {
            tracing::warn!(%user_id, email = %seed.email, "Existing account promoted to admin")
        }
        AdminBootstrap::AlreadyAdmin { .. } => {
            tracing::info!(email = %seed.email, "Admin account already exists, seed skipped")
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::user::RegisterRequest;
    use crate::storage::JsonFileStore;
    use std::sync::Arc;

    fn seed() -> AdminSeed {
        AdminSeed {
            email: "Root@Example.com".to_string(),
            password: "AdminPass123".to_string(),
            name: "Root".to_string(),
        }
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let mut config = Config::with_json_store("unused");
        config.admin_seed = Some(seed());
        let state = AppState::with_store(config, Arc::new(JsonFileStore::in_memory()));

        bootstrap(&state).await.unwrap();
        bootstrap(&state).await.unwrap();

        assert_eq!(state.store.count_users().await.unwrap(), 1);
        let admin = state
            .store
            .find_user_by_email("root@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn existing_student_is_promoted() {
        let config = Config::with_json_store("unused");
        let store: Arc<dyn QuizStore> = Arc::new(JsonFileStore::in_memory());
        let auth = AuthService::new(
            store.clone(),
            crate::middlewares::auth::JwtService::new(&config.jwt_secret),
            &config,
        );
        auth.register(RegisterRequest {
            name: "Root".to_string(),
            email: "root@example.com".to_string(),
            password: "Student123".to_string(),
            role: None,
        })
        .await
        .unwrap();

        let outcome = ensure_admin(&auth, store.as_ref(), &seed()).await.unwrap();
        assert!(matches!(outcome, AdminBootstrap::Promoted { .. }));
        let outcome = ensure_admin(&auth, store.as_ref(), &seed()).await.unwrap();
        assert!(matches!(outcome, AdminBootstrap::AlreadyAdmin { .. }));
    }
}

//! Creates (or promotes) an admin account.
//!
//! Usage: `create_admin <email> <password> [name]`. Without arguments the
//! ADMIN_EMAIL / ADMIN_PASSWORD configuration is used.

use anyhow::{bail, Context};
use tracing_subscriber::fmt::init;

use adaptive_quiz_api::{
    config::{AdminSeed, Config},
    services::{
        auth_service::AuthService,
        superuser_seed::{ensure_admin, AdminBootstrap},
        AppState,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::load().context("Failed to load configuration")?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let seed = match args.as_slice() {
        [email, password] => AdminSeed {
            email: email.clone(),
            password: password.clone(),
            name: "Administrator".to_string(),
        },
        [email, password, name] => AdminSeed {
            email: email.clone(),
            password: password.clone(),
            name: name.clone(),
        },
        [] => match config.admin_seed.clone() {
            Some(seed) => seed,
            None => bail!("Usage: create_admin <email> <password> [name] (or set ADMIN_EMAIL and ADMIN_PASSWORD)"),
        },
        _ => bail!("Usage: create_admin <email> <password> [name]"),
    };

    let state = AppState::new(config)
        .await
        .context("Failed to initialize app state")?;
    let auth = AuthService::new(state.store.clone(), state.jwt.clone(), &state.config);

    match ensure_admin(&auth, state.store.as_ref(), &seed).await? {
        AdminBootstrap::Created { user_id } => println!("Admin {} created ({})", seed.email, user_id),
        AdminBootstrap::Promoted { user_id } => {
            println!("Existing account {} promoted to admin ({})", seed.email, user_id)
        }
        AdminBootstrap::AlreadyAdmin { user_id } => {
            println!("{} is already an admin ({})", seed.email, user_id)
        }
    }
    Ok(())
}

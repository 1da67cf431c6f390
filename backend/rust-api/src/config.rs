use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongo,
    Json,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            "json" | "file" => Ok(StorageBackend::Json),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

/// Quiz limits applied by the quiz service
#[derive(Debug, Clone)]
pub struct QuizSettings {
    pub default_questions: u32,
    pub max_questions: u32,
    pub time_limit_minutes: u32,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            default_questions: 10,
            max_questions: 50,
            time_limit_minutes: 30,
        }
    }
}

/// Admin account ensured at startup
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub json_data_dir: PathBuf,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub password_hash_cost: u32,
    pub bind_addr: String,
    pub cors_origins: Vec<String>,
    pub quiz: QuizSettings,
    pub admin_seed: Option<AdminSeed>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml, then APP__SECTION__KEY overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let lookup = |key: &str, fallbacks: &[&str]| -> Option<String> {
            settings
                .get_string(key)
                .ok()
                .or_else(|| fallbacks.iter().find_map(|name| env::var(name).ok()))
                .filter(|value| !value.trim().is_empty())
        };

        let storage_backend = match lookup("storage.backend", &["STORAGE_BACKEND"]) {
            Some(raw) => raw.parse().map_err(config::ConfigError::Message)?,
            None => StorageBackend::Mongo,
        };

        let mongo_uri = lookup("database.mongo_uri", &["MONGO_URI", "MONGODB_URL"])
            .unwrap_or_else(|| "mongodb://localhost:27017".to_string());

        let mongo_database = lookup("database.mongo_database", &["DATABASE_NAME", "MONGO_DATABASE"])
            .unwrap_or_else(|| "adaptive_quiz".to_string());

        let json_data_dir = lookup("storage.json_data_dir", &["JSON_DATA_DIR"])
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));

        let jwt_secret = lookup("auth.jwt_secret", &["SECRET_KEY", "JWT_SECRET"])
            .unwrap_or_else(|| {
                if env == "prod" {
                    panic!("FATAL: SECRET_KEY must be set in production!");
                }
                eprintln!("WARNING: Using default SECRET_KEY (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            });

        let access_token_ttl_minutes = parse_or(
            lookup("auth.access_token_expire_minutes", &["ACCESS_TOKEN_EXPIRE_MINUTES"]),
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            30,
        )?;

        let password_hash_cost = parse_or(
            lookup("auth.password_hash_cost", &["PASSWORD_HASH_COST"]),
            "PASSWORD_HASH_COST",
            bcrypt::DEFAULT_COST,
        )?;

        let bind_addr =
            lookup("server.bind_addr", &["BIND_ADDR"]).unwrap_or_else(|| "0.0.0.0:8000".to_string());

        let cors_origins = lookup("server.cors_origins", &["CORS_ORIGINS"])
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let defaults = QuizSettings::default();
        let quiz = QuizSettings {
            default_questions: parse_or(
                lookup("quiz.default_questions", &[]),
                "quiz.default_questions",
                defaults.default_questions,
            )?,
            max_questions: parse_or(
                lookup("quiz.max_questions", &[]),
                "quiz.max_questions",
                defaults.max_questions,
            )?,
            time_limit_minutes: parse_or(
                lookup("quiz.time_limit_minutes", &[]),
                "quiz.time_limit_minutes",
                defaults.time_limit_minutes,
            )?,
        };

        let admin_seed = match (
            lookup("admin.email", &["ADMIN_EMAIL"]),
            lookup("admin.password", &["ADMIN_PASSWORD"]),
        ) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email,
                password,
                name: lookup("admin.name", &["ADMIN_NAME"])
                    .unwrap_or_else(|| "Administrator".to_string()),
            }),
            _ => None,
        };

        Ok(Config {
            storage_backend,
            mongo_uri,
            mongo_database,
            json_data_dir,
            jwt_secret,
            access_token_ttl_minutes,
            password_hash_cost,
            bind_addr,
            cors_origins,
            quiz,
            admin_seed,
        })
    }

    /// JSON-file storage under `dir`, cheap bcrypt, no admin seed. Used by tests and local tooling.
    pub fn with_json_store(dir: impl Into<PathBuf>) -> Self {
        Config {
            storage_backend: StorageBackend::Json,
            mongo_uri: String::new(),
            mongo_database: String::new(),
            json_data_dir: dir.into(),
            jwt_secret: "test-secret".to_string(),
            access_token_ttl_minutes: 30,
            password_hash_cost: 4,
            bind_addr: "127.0.0.1:0".to_string(),
            cors_origins: Vec::new(),
            quiz: QuizSettings::default(),
            admin_seed: None,
        }
    }
}

fn parse_or<T: FromStr>(
    raw: Option<String>,
    name: &str,
    default: T,
) -> Result<T, config::ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| config::ConfigError::Message(format!("invalid value for {name}: {value}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "APP_ENV",
        "STORAGE_BACKEND",
        "JSON_DATA_DIR",
        "SECRET_KEY",
        "JWT_SECRET",
        "ACCESS_TOKEN_EXPIRE_MINUTES",
        "ADMIN_EMAIL",
        "ADMIN_PASSWORD",
        "CORS_ORIGINS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn storage_backend_parses_aliases() {
        assert_eq!("mongodb".parse::<StorageBackend>(), Ok(StorageBackend::Mongo));
        assert_eq!(" JSON ".parse::<StorageBackend>(), Ok(StorageBackend::Json));
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    #[serial]
    fn env_fallbacks_are_applied() {
        clear_env();
        env::set_var("STORAGE_BACKEND", "json");
        env::set_var("JSON_DATA_DIR", "/tmp/quiz-data");
        env::set_var("SECRET_KEY", "from-env");
        env::set_var("ACCESS_TOKEN_EXPIRE_MINUTES", "45");
        env::set_var("CORS_ORIGINS", "http://localhost:3000, http://localhost:5173");

        let config = Config::load().unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Json);
        assert_eq!(config.json_data_dir, PathBuf::from("/tmp/quiz-data"));
        assert_eq!(config.jwt_secret, "from-env");
        assert_eq!(config.access_token_ttl_minutes, 45);
        assert_eq!(config.cors_origins.len(), 2);
        assert!(config.admin_seed.is_none());
        clear_env();
    }

    #[test]
    #[serial]
    fn admin_seed_needs_email_and_password() {
        clear_env();
        env::set_var("ADMIN_EMAIL", "root@example.com");
        assert!(Config::load().unwrap().admin_seed.is_none());

        env::set_var("ADMIN_PASSWORD", "Secret123");
        let seed = Config::load().unwrap().admin_seed.unwrap();
        assert_eq!(seed.email, "root@example.com");
        assert_eq!(seed.name, "Administrator");
        clear_env();
    }

    #[test]
    #[serial]
    fn bad_number_is_a_config_error() {
        clear_env();
        env::set_var("ACCESS_TOKEN_EXPIRE_MINUTES", "soon");
        assert!(Config::load().is_err());
        clear_env();
    }
}

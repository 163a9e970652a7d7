use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub model_api_url: String,
}

impl Config {
    /// Layered load: optional `config/{env}.toml`, then `APP__`-prefixed
    /// environment variables, then plain environment fallbacks.
    pub fn load() -> Result<Self, config::ConfigError> {
        // The deployment .env lives at the repository root, two levels up.
        // SKIP_ROOT_ENV forces the local .env (used by the test harness).
        if env::var("SKIP_ROOT_ENV").is_ok() || dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env_name = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env_name)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let lookup = |key: &str, env_key: &str| -> Result<String, env::VarError> {
            settings.get_string(key).or_else(|_| env::var(env_key))
        };

        let mongo_uri = lookup("database.mongo_uri", "MONGO_URI").unwrap_or_else(|_| {
            let user = env::var("MONGO_USER").expect("MONGO_USER must be set");
            let password = env::var("MONGO_PASSWORD").expect("MONGO_PASSWORD must be set");
            let db = env::var("MONGO_DB").unwrap_or_else(|_| "tutorflow".to_string());
            eprintln!("WARNING: Building MongoDB URI from MONGO_USER/MONGO_PASSWORD env vars");
            format!(
                "mongodb://{}:{}@localhost:27017/{}?authSource=admin",
                user, password, db
            )
        });

        let redis_uri = lookup("redis.uri", "REDIS_URI").unwrap_or_else(|_| {
            let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
            let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
            let password = env::var("REDIS_PASSWORD").expect("REDIS_PASSWORD must be set");
            eprintln!("WARNING: Building Redis URI from REDIS_PASSWORD env var");
            format!("redis://:{}@{}:{}/0", password, host, port)
        });

        let mongo_database = lookup("database.mongo_database", "MONGO_DATABASE")
            .unwrap_or_else(|_| "tutorflow".to_string());

        let model_api_url = lookup("model_api.url", "MODEL_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        Ok(Config {
            mongo_uri,
            redis_uri,
            mongo_database,
            model_api_url,
        })
    }
}

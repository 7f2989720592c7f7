use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub production: bool,
    pub token_ttl_hours: i64,
    pub token_refresh_threshold_hours: i64,
    pub catalog_cache_ttl_secs: u64,
    pub cors_origin: Option<String>,
    pub db_max_connections: u32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000);
        let production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let cors_origin = env::var("CORS_ORIGIN").ok().filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            production,
            token_ttl_hours: parse_or("TOKEN_TTL_HOURS", 168),
            token_refresh_threshold_hours: parse_or("TOKEN_REFRESH_THRESHOLD_HOURS", 24),
            catalog_cache_ttl_secs: parse_or("CATALOG_CACHE_TTL_SECS", 30),
            cors_origin,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
        })
    }

    /// Configuration for tests and tooling that never read the environment.
    pub fn for_tests(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".into(),
            port: 0,
            jwt_secret: "test-secret".into(),
            production: false,
            token_ttl_hours: 168,
            token_refresh_threshold_hours: 24,
            catalog_cache_ttl_secs: 0,
            cors_origin: None,
            db_max_connections: 5,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}

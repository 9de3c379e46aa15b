use std::net::SocketAddr;
use std::time::Duration;

pub const DEV_JWT_SECRET: &str = "dev-insecure-change-me";

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

/// Process-wide settings, read once at boot.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub environment: String,
    pub jwt_secret: String,
    pub access_ttl: chrono::Duration,
    pub refresh_ttl: chrono::Duration,
    pub login_max_attempts: usize,
    pub login_window: Duration,
    pub max_request_bytes: usize,
    pub allowed_origins: Vec<String>,
    pub require_https: bool,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            bind_addr: ([0, 0, 0, 0], 8080).into(),
            environment: "development".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_ttl: chrono::Duration::minutes(30),
            refresh_ttl: chrono::Duration::days(7),
            login_max_attempts: 5,
            login_window: Duration::from_secs(300),
            max_request_bytes: 1024 * 1024,
            allowed_origins: parse_origins(DEFAULT_ALLOWED_ORIGINS),
            require_https: false,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests need not touch the
    /// process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let database_url = get("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required"))?;

        let bind_addr = match get("LMS_BIND_ADDR") {
            Some(raw) => raw
                .trim()
                .parse::<SocketAddr>()
                .map_err(|e| anyhow::anyhow!("invalid LMS_BIND_ADDR {raw:?}: {e}"))?,
            None => defaults.bind_addr,
        };

        let environment = get("LMS_ENVIRONMENT")
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.environment);

        let jwt_secret = get("LMS_JWT_SECRET")
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.jwt_secret);
        if environment == "production" && jwt_secret == DEV_JWT_SECRET {
            anyhow::bail!("LMS_JWT_SECRET must be set to a real secret in production");
        }

        let access_minutes = parse_clamped(&get, "LMS_ACCESS_TTL_MINUTES", 30, 1, 24 * 60);
        let refresh_days = parse_clamped(&get, "LMS_REFRESH_TTL_DAYS", 7, 1, 90);
        let login_max_attempts = parse_clamped(&get, "LMS_LOGIN_MAX_ATTEMPTS", 5, 1, 1000);
        let login_window_secs = parse_clamped(&get, "LMS_LOGIN_WINDOW_SECS", 300, 1, 86_400);
        let max_request_bytes =
            parse_clamped(&get, "LMS_MAX_REQUEST_BYTES", 1024 * 1024, 1024, 64 * 1024 * 1024);

        let allowed_origins = get("LMS_ALLOWED_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or(defaults.allowed_origins);

        Ok(Self {
            database_url,
            bind_addr,
            environment,
            jwt_secret,
            access_ttl: chrono::Duration::minutes(access_minutes as i64),
            refresh_ttl: chrono::Duration::days(refresh_days as i64),
            login_max_attempts: login_max_attempts as usize,
            login_window: Duration::from_secs(login_window_secs),
            max_request_bytes: max_request_bytes as usize,
            allowed_origins,
            require_https: get("LMS_REQUIRE_HTTPS").is_some_and(|v| is_truthy(&v)),
            admin_email: get("LMS_ADMIN_EMAIL").filter(|v| !v.trim().is_empty()),
            admin_password: get("LMS_ADMIN_PASSWORD").filter(|v| !v.is_empty()),
        })
    }
}

fn parse_clamped(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
    min: u64,
    max: u64,
) -> u64 {
    get(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

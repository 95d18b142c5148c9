use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. `DATABASE_URL` and `ENCRYPTION_KEY` are secrets read once in
/// `main` and are not kept here.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// Whole-request timeout in seconds (default: `60`). Bulk uploads and
    /// moves are exempt; each of their Pipefy calls is bounded by
    /// `pipefy.timeout_secs` instead.
    pub request_timeout_secs: u64,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Pipefy API access.
    pub pipefy: PipefyConfig,
    /// Per-caller flow sessions.
    pub session: SessionConfig,
}

/// Pipefy GraphQL client and bulk driver settings.
#[derive(Debug, Clone)]
pub struct PipefyConfig {
    /// GraphQL endpoint (default: `https://api.pipefy.com/graphql`).
    pub api_url: String,
    /// Per-request timeout in seconds (default: `30`).
    pub timeout_secs: u64,
    /// Cards processed concurrently by bulk operations (default: `4`).
    pub bulk_concurrency: usize,
}

/// Session cache bounds.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle flow lifetime in seconds (default: `3600`).
    pub ttl_secs: u64,
    /// Maximum live flows (default: `10000`).
    pub max_entries: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                          |
    /// |------------------------|----------------------------------|
    /// | `HOST`                 | `0.0.0.0`                        |
    /// | `PORT`                 | `8000`                           |
    /// | `CORS_ORIGINS`         | `http://localhost:3000`          |
    /// | `REQUEST_TIMEOUT_SECS` | `60`                             |
    /// | `PIPEFY_API_URL`       | `https://api.pipefy.com/graphql` |
    /// | `PIPEFY_TIMEOUT_SECS`  | `30`                             |
    /// | `BULK_CONCURRENCY`     | `4`                              |
    /// | `SESSION_TTL_SECS`     | `3600`                           |
    /// | `SESSION_MAX_ENTRIES`  | `10000`                          |
    ///
    /// # Panics
    ///
    /// Panics on malformed numeric values and on a missing `JWT_SECRET`;
    /// misconfiguration should fail at boot.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = env_parse("PORT", 8000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", 60);

        let pipefy = PipefyConfig {
            api_url: std::env::var("PIPEFY_API_URL")
                .unwrap_or_else(|_| openpipes_pipefy::client::DEFAULT_API_URL.into()),
            timeout_secs: env_parse("PIPEFY_TIMEOUT_SECS", 30),
            bulk_concurrency: env_parse("BULK_CONCURRENCY", openpipes_pipefy::bulk::DEFAULT_CONCURRENCY),
        };

        let session = SessionConfig {
            ttl_secs: env_parse("SESSION_TTL_SECS", 3600),
            max_entries: env_parse("SESSION_MAX_ENTRIES", 10_000),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt: JwtConfig::from_env(),
            pipefy,
            session,
        }
    }
}

/// Parse `name` from the environment, falling back to `default` when unset.
pub(crate) fn env_parse<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}

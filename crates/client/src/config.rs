/// Backend client configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend API, without a trailing slash.
    pub api_url: String,
    /// Bearer token attached to every request, when present.
    pub api_token: Option<String>,
    /// Timeout for JSON requests in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Timeout for scene uploads in seconds (default: `300`).
    pub upload_timeout_secs: u64,
}

/// Default backend URL for local development.
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 300;

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            upload_timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Load `.env` (if present), then read the environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                     |
    /// |------------------------|-----------------------------|
    /// | `SHOTGUIDE_API_URL`    | `http://localhost:3000/api` |
    /// | `SHOTGUIDE_API_TOKEN`  | unset                       |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                        |
    /// | `UPLOAD_TIMEOUT_SECS`  | `300`                       |
    ///
    /// Unparseable numbers fall back to their defaults with a warning.
    pub fn from_env() -> Self {
        let api_url = std::env::var("SHOTGUIDE_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.into())
            .trim_end_matches('/')
            .to_string();

        let api_token = std::env::var("SHOTGUIDE_API_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Self {
            api_url,
            api_token,
            request_timeout_secs: env_u64("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            upload_timeout_secs: env_u64("UPLOAD_TIMEOUT_SECS", DEFAULT_UPLOAD_TIMEOUT_SECS),
        }
    }

    /// Config pointing at `api_url` with default timeouts.
    pub fn with_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => parse_positive(name, &raw, default),
        Err(_) => default,
    }
}

/// Zero is rejected along with anything that is not a number.
fn parse_positive(name: &str, raw: &str, default: u64) -> u64 {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => value,
        _ => {
            tracing::warn!(var = name, value = %raw, default, "Invalid number, using default");
            default
        }
    }
}

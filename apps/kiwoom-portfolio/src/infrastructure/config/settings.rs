//! Service Configuration Settings
//!
//! Configuration types for the portfolio service, loaded from environment
//! variables.

use std::time::Duration;

/// Kiwoom server environment (mock vs live).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KiwoomEnvironment {
    /// Mock investment server.
    #[default]
    Mock,
    /// Live trading server (real money).
    Live,
}

impl KiwoomEnvironment {
    /// Parse environment from string. Anything but `LIVE` is mock.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "LIVE" => Self::Live,
            _ => Self::Mock,
        }
    }

    /// Check if this is the live environment.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Get the environment name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Live => "live",
        }
    }

    /// REST API host.
    #[must_use]
    pub const fn rest_host(&self) -> &'static str {
        match self {
            Self::Mock => "https://mockapi.kiwoom.com",
            Self::Live => "https://api.kiwoom.com",
        }
    }

    /// Realtime WebSocket URL.
    #[must_use]
    pub const fn ws_url(&self) -> &'static str {
        match self {
            Self::Mock => "wss://mockapi.kiwoom.com:10000/api/dostk/websocket",
            Self::Live => "wss://api.kiwoom.com:10000/api/dostk/websocket",
        }
    }
}

/// Kiwoom app credentials.
#[derive(Clone)]
pub struct Credentials {
    app_key: String,
    secret_key: String,
}

impl Credentials {
    /// Create credentials.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyValue` if either value is blank.
    pub fn new(app_key: impl Into<String>, secret_key: impl Into<String>) -> Result<Self, ConfigError> {
        let app_key = app_key.into();
        let secret_key = secret_key.into();

        if app_key.trim().is_empty() {
            return Err(ConfigError::EmptyValue(APP_KEY_VAR.to_string()));
        }
        if secret_key.trim().is_empty() {
            return Err(ConfigError::EmptyValue(SECRET_KEY_VAR.to_string()));
        }

        Ok(Self {
            app_key,
            secret_key,
        })
    }

    /// Get the app key.
    #[must_use]
    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    /// Get the secret key.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("app_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// REST client settings.
#[derive(Debug, Clone)]
pub struct RestSettings {
    /// REST API host.
    pub host: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Pause between consecutive pages.
    pub page_delay: Duration,
    /// Page limit for paginated transactions.
    pub max_pages: u32,
    /// Exchange code for the account balance query.
    pub exchange: String,
    /// Account balance refresh interval.
    pub account_refresh: Duration,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            host: KiwoomEnvironment::Mock.rest_host().to_string(),
            timeout: Duration::from_secs(30),
            page_delay: Duration::from_secs(1),
            max_pages: 3,
            exchange: "KRX".to_string(),
            account_refresh: Duration::from_secs(60),
        }
    }
}

/// Realtime stream settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// WebSocket URL.
    pub url: String,
    /// Registration group number.
    pub group: String,
    /// Realtime types to register.
    pub types: Vec<String>,
    /// Whether to reconnect after a transport failure.
    pub reconnect_enabled: bool,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: KiwoomEnvironment::Mock.ws_url().to_string(),
            group: "1".to_string(),
            types: vec!["0B".to_string()],
            reconnect_enabled: true,
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0, // Unlimited
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Status HTTP port (health, metrics, portfolio).
    pub status_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { status_port: 8083 }
    }
}

const APP_KEY_VAR: &str = "KIWOOM_APP_KEY";
const SECRET_KEY_VAR: &str = "KIWOOM_SECRET_KEY";

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Kiwoom environment.
    pub environment: KiwoomEnvironment,
    /// App credentials.
    pub credentials: Credentials,
    /// REST client settings.
    pub rest: RestSettings,
    /// Realtime stream settings.
    pub stream: StreamSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are missing or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let app_key = env
            .get(APP_KEY_VAR)
            .ok_or_else(|| ConfigError::MissingEnvVar(APP_KEY_VAR.to_string()))?;
        let secret_key = env
            .get(SECRET_KEY_VAR)
            .ok_or_else(|| ConfigError::MissingEnvVar(SECRET_KEY_VAR.to_string()))?;
        let credentials = Credentials::new(app_key, secret_key)?;

        let environment = env
            .get("KIWOOM_ENV")
            .map(|s| KiwoomEnvironment::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let rest_defaults = RestSettings::default();
        let rest = RestSettings {
            host: env
                .get("KIWOOM_REST_HOST")
                .unwrap_or_else(|| environment.rest_host().to_string()),
            timeout: env.duration_secs("KIWOOM_HTTP_TIMEOUT_SECS", rest_defaults.timeout),
            page_delay: env.duration_millis("KIWOOM_PAGE_DELAY_MS", rest_defaults.page_delay),
            max_pages: env.parse("KIWOOM_MAX_PAGES", rest_defaults.max_pages),
            exchange: env.get("KIWOOM_EXCHANGE").unwrap_or(rest_defaults.exchange),
            account_refresh: env
                .duration_secs("KIWOOM_ACCOUNT_REFRESH_SECS", rest_defaults.account_refresh),
        };

        let stream_defaults = StreamSettings::default();
        let stream = StreamSettings {
            url: env
                .get("KIWOOM_WS_URL")
                .unwrap_or_else(|| environment.ws_url().to_string()),
            group: env.get("KIWOOM_STREAM_GROUP").unwrap_or(stream_defaults.group),
            types: env
                .get("KIWOOM_STREAM_TYPES")
                .map(|s| parse_list(&s))
                .filter(|types| !types.is_empty())
                .unwrap_or(stream_defaults.types),
            reconnect_enabled: env
                .get("KIWOOM_RECONNECT_ENABLED")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(stream_defaults.reconnect_enabled),
            reconnect_delay_initial: env.duration_millis(
                "KIWOOM_RECONNECT_DELAY_INITIAL_MS",
                stream_defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: env.duration_secs(
                "KIWOOM_RECONNECT_DELAY_MAX_SECS",
                stream_defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: env.parse(
                "KIWOOM_RECONNECT_DELAY_MULTIPLIER",
                stream_defaults.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: env.parse(
                "KIWOOM_MAX_RECONNECT_ATTEMPTS",
                stream_defaults.max_reconnect_attempts,
            ),
        };

        let server = ServerSettings {
            status_port: env.parse("STATUS_PORT", ServerSettings::default().status_port),
        };

        Ok(Self {
            environment,
            credentials,
            rest,
            stream,
            server,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}

fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    const KEYS: [(&str, &str); 2] = [("KIWOOM_APP_KEY", "app"), ("KIWOOM_SECRET_KEY", "secret")];

    #[test]
    fn environment_parsing() {
        assert_eq!(
            KiwoomEnvironment::from_str_case_insensitive("live"),
            KiwoomEnvironment::Live
        );
        assert_eq!(
            KiwoomEnvironment::from_str_case_insensitive("MOCK"),
            KiwoomEnvironment::Mock
        );
        assert_eq!(
            KiwoomEnvironment::from_str_case_insensitive("unknown"),
            KiwoomEnvironment::Mock
        );
        assert!(KiwoomEnvironment::Live.is_live());
    }

    #[test]
    fn credentials_redacted_debug() {
        let creds = Credentials::new("key123", "secret456").unwrap();
        let debug = format!("{creds:?}");
        assert!(!debug.contains("key123"));
        assert!(!debug.contains("secret456"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn credentials_reject_blank_values() {
        assert!(matches!(
            Credentials::new("", "secret"),
            Err(ConfigError::EmptyValue(var)) if var == "KIWOOM_APP_KEY"
        ));
        assert!(matches!(
            Credentials::new("key", "  "),
            Err(ConfigError::EmptyValue(var)) if var == "KIWOOM_SECRET_KEY"
        ));
    }

    #[test]
    fn missing_credentials_fail() {
        assert!(matches!(
            config_from(&[("KIWOOM_APP_KEY", "app")]),
            Err(ConfigError::MissingEnvVar(var)) if var == "KIWOOM_SECRET_KEY"
        ));
    }

    #[test]
    fn defaults_target_mock_server() {
        let config = config_from(&KEYS).unwrap();
        assert_eq!(config.environment, KiwoomEnvironment::Mock);
        assert_eq!(config.rest.host, "https://mockapi.kiwoom.com");
        assert_eq!(config.rest.timeout, Duration::from_secs(30));
        assert_eq!(config.rest.page_delay, Duration::from_secs(1));
        assert_eq!(config.rest.max_pages, 3);
        assert_eq!(config.rest.exchange, "KRX");
        assert_eq!(
            config.stream.url,
            "wss://mockapi.kiwoom.com:10000/api/dostk/websocket"
        );
        assert_eq!(config.stream.types, vec!["0B"]);
        assert!(config.stream.reconnect_enabled);
        assert_eq!(config.server.status_port, 8083);
    }

    #[test]
    fn overrides_are_applied() {
        let mut vars = KEYS.to_vec();
        vars.extend([
            ("KIWOOM_ENV", "LIVE"),
            ("KIWOOM_PAGE_DELAY_MS", "250"),
            ("KIWOOM_MAX_PAGES", "5"),
            ("KIWOOM_STREAM_TYPES", "0B, 0D,"),
            ("KIWOOM_RECONNECT_ENABLED", "false"),
            ("KIWOOM_MAX_RECONNECT_ATTEMPTS", "4"),
            ("STATUS_PORT", "9000"),
        ]);
        let config = config_from(&vars).unwrap();
        assert_eq!(config.rest.host, "https://api.kiwoom.com");
        assert_eq!(config.stream.url, "wss://api.kiwoom.com:10000/api/dostk/websocket");
        assert_eq!(config.rest.page_delay, Duration::from_millis(250));
        assert_eq!(config.rest.max_pages, 5);
        assert_eq!(config.stream.types, vec!["0B", "0D"]);
        assert!(!config.stream.reconnect_enabled);
        assert_eq!(config.stream.max_reconnect_attempts, 4);
        assert_eq!(config.server.status_port, 9000);
    }

    #[test]
    fn host_overrides_win_over_environment() {
        let mut vars = KEYS.to_vec();
        vars.extend([
            ("KIWOOM_ENV", "LIVE"),
            ("KIWOOM_REST_HOST", "http://127.0.0.1:8080"),
            ("KIWOOM_WS_URL", "ws://127.0.0.1:9000/ws"),
        ]);
        let config = config_from(&vars).unwrap();
        assert_eq!(config.rest.host, "http://127.0.0.1:8080");
        assert_eq!(config.stream.url, "ws://127.0.0.1:9000/ws");
    }

    #[test]
    fn unparseable_values_fall_back() {
        let mut vars = KEYS.to_vec();
        vars.extend([("KIWOOM_MAX_PAGES", "many"), ("KIWOOM_RECONNECT_ENABLED", "maybe")]);
        let config = config_from(&vars).unwrap();
        assert_eq!(config.rest.max_pages, 3);
        assert!(config.stream.reconnect_enabled);
    }
}

use std::borrow::Cow;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("{0} must be set when APP_ENV=production")]
    MissingInProduction(&'static str),
}

/// Which document store backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Database configuration with `Cow` for flexible string handling
#[derive(Debug, Clone)]
pub struct DbConfig<'a> {
    pub host: Cow<'a, str>,
    pub port: u16,
    pub database: Cow<'a, str>,
    pub user: Cow<'a, str>,
    pub password: Cow<'a, str>,
    pub max_connections: u32,
    /// Full URL; takes precedence over the individual parts when present.
    pub url: Option<Cow<'a, str>>,
}

impl<'a> DbConfig<'a> {
    pub fn new(
        host: impl Into<Cow<'a, str>>,
        port: u16,
        database: impl Into<Cow<'a, str>>,
        user: impl Into<Cow<'a, str>>,
        password: impl Into<Cow<'a, str>>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            user: user.into(),
            password: password.into(),
            max_connections: 10,
            url: None,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_url(mut self, url: impl Into<Cow<'a, str>>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Build the PostgreSQL connection string, borrowing the explicit URL when one was given
    pub fn connection_string(&self) -> Cow<'_, str> {
        match &self.url {
            Some(url) => Cow::Borrowed(url.as_ref()),
            None => Cow::Owned(format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.database
            )),
        }
    }

    pub fn from_env() -> Result<DbConfig<'static>, ConfigError> {
        let host = env_or("DB_HOST", "localhost");
        let port = parse_env("DB_PORT", 5432u16)?;
        let database = env_or("DB_NAME", "telehealth");
        let user = env_or("DB_USER", "postgres");
        let password = env_or("DB_PASSWORD", "postgres");
        let max_connections = parse_env("DB_MAX_CONNECTIONS", 10u32)?;

        let mut config =
            DbConfig::new(host, port, database, user, password).with_max_connections(max_connections);
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config = config.with_url(url);
        }
        Ok(config)
    }
}

impl<'a> Default for DbConfig<'a> {
    fn default() -> Self {
        Self {
            host: Cow::Borrowed("localhost"),
            port: 5432,
            database: Cow::Borrowed("telehealth"),
            user: Cow::Borrowed("postgres"),
            password: Cow::Borrowed("postgres"),
            max_connections: 10,
            url: None,
        }
    }
}

/// An OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub openai: Option<LlmProviderConfig>,
    pub glm: Option<LlmProviderConfig>,
    pub timeout: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            openai: None,
            glm: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FcmConfig {
    pub server_key: Option<String>,
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub database: DbConfig<'static>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub ai: AiConfig,
    pub fcm: FcmConfig,
}

const DEV_JWT_SECRET: &str = "telehealth-dev-secret";
const FCM_DEFAULT_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env_or("APP_ENV", "development");
        let production = environment == "production";

        let store = match env_or("DATA_STORE", "postgres").as_str() {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "DATA_STORE",
                    value: other.to_string(),
                })
            }
        };

        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if production => return Err(ConfigError::MissingInProduction("JWT_SECRET")),
            _ => DEV_JWT_SECRET.to_string(),
        };

        let ai = AiConfig {
            openai: provider_from_env(
                "OPENAI",
                "https://api.openai.com/v1",
                "gpt-3.5-turbo",
            ),
            glm: provider_from_env("GLM", "https://open.bigmodel.cn/api/paas/v4", "glm-4"),
            timeout: Duration::from_secs(parse_env("AI_TIMEOUT_SECS", 30u64)?),
        };

        let fcm = FcmConfig {
            server_key: std::env::var("FCM_SERVER_KEY").ok().filter(|k| !k.is_empty()),
            endpoint: env_or("FCM_ENDPOINT", FCM_DEFAULT_ENDPOINT),
        };

        Ok(Self {
            environment,
            host: env_or("HOST", "0.0.0.0"),
            port: parse_env("PORT", 3000u16)?,
            store,
            database: DbConfig::from_env()?,
            jwt_secret,
            jwt_expiry_hours: parse_env("JWT_EXPIRY_HOURS", 24i64)?,
            ai,
            fcm,
        })
    }

    /// In-memory configuration used by tests and local tooling
    pub fn for_tests() -> Self {
        Self {
            environment: "test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            store: StoreBackend::Memory,
            database: DbConfig::default(),
            jwt_secret: "test-secret".to_string(),
            jwt_expiry_hours: 1,
            ai: AiConfig::default(),
            fcm: FcmConfig {
                server_key: None,
                endpoint: FCM_DEFAULT_ENDPOINT.to_string(),
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

fn provider_from_env(prefix: &str, base_url: &str, model: &str) -> Option<LlmProviderConfig> {
    let api_key = std::env::var(format!("{prefix}_API_KEY"))
        .ok()
        .filter(|k| !k.is_empty())?;
    Some(LlmProviderConfig {
        api_key,
        base_url: env_or(&format!("{prefix}_BASE_URL"), base_url),
        model: env_or(&format!("{prefix}_MODEL"), model),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_string_from_parts() {
        let config = DbConfig::new("db", 5433, "care", "svc", "pw");
        assert_eq!(config.connection_string(), "postgres://svc:pw@db:5433/care");
    }

    #[test]
    fn explicit_url_wins() {
        let config = DbConfig::default().with_url("postgres://elsewhere/x");
        assert_eq!(config.connection_string(), "postgres://elsewhere/x");
        assert!(matches!(config.connection_string(), Cow::Borrowed(_)));
    }

    #[test]
    fn default_pool_size() {
        assert_eq!(DbConfig::default().max_connections, 10);
        assert_eq!(DbConfig::default().with_max_connections(3).max_connections, 3);
    }

    #[test]
    fn test_config_uses_memory_store() {
        let config = AppConfig::for_tests();
        assert_eq!(config.store, StoreBackend::Memory);
        assert!(!config.is_production());
        assert_eq!(config.bind_address(), "127.0.0.1:0");
    }
}

use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::time::Duration;

/// API key pair. Never printed or serialized in clear.
#[derive(Debug, Clone)]
pub struct Credentials {
    api_key: Secret<String>,
    secret_key: Secret<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            secret_key: Secret::new(secret_key.into()),
        }
    }

    /// Exposes the secret
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Exposes the secret
    pub fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }

    fn is_complete(&self) -> bool {
        !self.api_key().is_empty() && !self.secret_key().is_empty()
    }
}

impl Serialize for Credentials {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Credentials", 2)?;
        state.serialize_field("api_key", "[REDACTED]")?;
        state.serialize_field("secret_key", "[REDACTED]")?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Credentials {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Plain {
            api_key: String,
            secret_key: String,
        }

        let plain = Plain::deserialize(deserializer)?;
        Ok(Self::new(plain.api_key, plain.secret_key))
    }
}

/// Where to connect and with which keys
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(flatten)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub testnet: bool,
    /// Overrides the mainnet REST host
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ExchangeConfig {
    #[must_use]
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            credentials: Some(Credentials::new(api_key, secret_key)),
            ..Self::default()
        }
    }

    /// Reads `{PREFIX}_API_KEY`, `{PREFIX}_API_SECRET` (or `{PREFIX}_SECRET_KEY`),
    /// and the optional `{PREFIX}_TESTNET` / `{PREFIX}_BASE_URL`.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let required = |name: &str| {
            let var = format!("{}_{}", prefix, name);
            env::var(&var).map_err(|_| ConfigError::MissingEnvironmentVariable(var))
        };

        let api_key = required("API_KEY")?;
        let secret_key = required("API_SECRET").or_else(|_| required("SECRET_KEY"))?;
        let testnet = match env::var(format!("{}_TESTNET", prefix)) {
            Ok(v) => v.parse::<bool>().map_err(|_| {
                ConfigError::InvalidConfiguration(format!(
                    "{}_TESTNET must be true or false, got {:?}",
                    prefix, v
                ))
            })?,
            Err(_) => false,
        };

        Ok(Self {
            credentials: Some(Credentials::new(api_key, secret_key)),
            testnet,
            base_url: env::var(format!("{}_BASE_URL", prefix)).ok(),
        })
    }

    /// Like [`ExchangeConfig::from_env`], after loading `path` into the
    /// environment. A missing file is not an error.
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str, path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load {}: {}",
                    path, e
                )));
            }
        }
        Self::from_env(prefix)
    }

    /// Public market data only
    #[must_use]
    pub fn read_only() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.credentials.as_ref().is_some_and(Credentials::is_complete)
    }

    #[must_use]
    pub const fn testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }
}

/// Source of API credentials. Queried once per channel `connect()` and once per
/// signed REST request, so rotated keys are picked up without a restart.
pub trait CredentialProvider: Send + Sync {
    fn get_credentials(&self) -> Option<Credentials>;
}

impl CredentialProvider for ExchangeConfig {
    fn get_credentials(&self) -> Option<Credentials> {
        self.credentials.clone().filter(Credentials::is_complete)
    }
}

impl CredentialProvider for Credentials {
    fn get_credentials(&self) -> Option<Credentials> {
        Some(self.clone())
    }
}

/// Reads `BINANCE_API_KEY` / `BINANCE_API_SECRET` from the process environment on
/// every call.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    key_var: String,
    secret_var: String,
}

impl EnvCredentials {
    pub fn new(key_var: impl Into<String>, secret_var: impl Into<String>) -> Self {
        Self {
            key_var: key_var.into(),
            secret_var: secret_var.into(),
        }
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new("BINANCE_API_KEY", "BINANCE_API_SECRET")
    }
}

impl CredentialProvider for EnvCredentials {
    fn get_credentials(&self) -> Option<Credentials> {
        let api_key = env::var(&self.key_var).ok().filter(|v| !v.is_empty())?;
        let secret_key = env::var(&self.secret_var).ok().filter(|v| !v.is_empty())?;
        Some(Credentials::new(api_key, secret_key))
    }
}

/// Timing and sizing knobs shared by the trading and market data channels.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// How long `connect()` waits for the socket to open
    pub connect_timeout: Duration,
    /// Liveness ping period while connected
    pub keepalive_interval: Duration,
    /// How long a correlated request waits for its response
    pub request_timeout: Duration,
    /// Automatic reconnect attempts before the channel gives up
    pub max_reconnect_attempts: u32,
    /// First reconnect delay; doubles per attempt
    pub reconnect_base_delay: Duration,
    /// Random spread applied to each reconnect delay, as a fraction of it
    pub reconnect_jitter: f64,
    /// Maximum concurrent stream names on one market data connection
    pub max_streams: usize,
    /// Optional `recvWindow` attached to signed requests (milliseconds)
    pub recv_window: Option<u64>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(180),
            request_timeout: Duration::from_secs(10),
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_jitter: 0.1,
            max_streams: 200,
            recv_window: None,
        }
    }
}

impl ChannelConfig {
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reconnect_jitter(mut self, jitter: f64) -> Self {
        self.reconnect_jitter = jitter;
        self
    }

    #[must_use]
    pub fn with_max_streams(mut self, max_streams: usize) -> Self {
        self.max_streams = max_streams;
        self
    }

    #[must_use]
    pub fn with_recv_window(mut self, recv_window: u64) -> Self {
        self.recv_window = Some(recv_window);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_redacts_secrets() {
        let config = ExchangeConfig::new("key".to_string(), "secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("[REDACTED]"));
        assert!(!json.contains("secret\""));
    }

    #[test]
    fn test_read_only_has_no_credentials() {
        let config = ExchangeConfig::read_only();
        assert!(!config.has_credentials());
        assert!(config.get_credentials().is_none());
    }

    #[test]
    fn test_config_provides_credentials() {
        let config = ExchangeConfig::new("key".to_string(), "secret".to_string());
        let creds = config.get_credentials().unwrap();
        assert_eq!(creds.api_key(), "key");
        assert_eq!(creds.secret_key(), "secret");
    }

    #[test]
    fn test_empty_key_is_not_a_credential() {
        let config = ExchangeConfig::new(String::new(), "secret".to_string());
        assert!(!config.has_credentials());
        assert!(config.get_credentials().is_none());
    }

    #[test]
    fn test_deserialize_flat_keys() {
        let config: ExchangeConfig = serde_json::from_str(
            r#"{"api_key":"k","secret_key":"s","testnet":true}"#,
        )
        .unwrap();
        assert!(config.testnet);
        assert_eq!(config.get_credentials().unwrap().api_key(), "k");

        let public: ExchangeConfig = serde_json::from_str(r#"{"testnet":false}"#).unwrap();
        assert!(!public.has_credentials());
    }

    #[test]
    fn test_env_credentials_absent() {
        let provider = EnvCredentials::new(
            "BRIDGE_TEST_MISSING_KEY_7f3a",
            "BRIDGE_TEST_MISSING_SECRET_7f3a",
        );
        assert!(provider.get_credentials().is_none());
    }
}

use crate::core::types::HostMode;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::time::Duration;

/// Default wait for a response to a single request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OpenApiConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub host_mode: HostMode,
    pub request_timeout: Duration,
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for OpenApiConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("OpenApiConfig", 5)?;
        state.serialize_field("client_id", &self.client_id)?;
        state.serialize_field("client_secret", "[REDACTED]")?;
        state.serialize_field("redirect_uri", &self.redirect_uri)?;
        state.serialize_field("host_mode", &self.host_mode)?;
        state.serialize_field("request_timeout_secs", &self.request_timeout.as_secs())?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for OpenApiConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct OpenApiConfigHelper {
            client_id: String,
            client_secret: String,
            redirect_uri: String,
            #[serde(default)]
            host_mode: HostMode,
            request_timeout_secs: Option<u64>,
        }

        let helper = OpenApiConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            client_id: helper.client_id,
            client_secret: Secret::new(helper.client_secret),
            redirect_uri: helper.redirect_uri,
            host_mode: helper.host_mode,
            request_timeout: helper
                .request_timeout_secs
                .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs),
        })
    }
}

impl OpenApiConfig {
    /// Create a new configuration with application credentials
    #[must_use]
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret: Secret::new(client_secret),
            redirect_uri,
            host_mode: HostMode::Demo,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_CLIENT_ID` (e.g., `CTRADER_CLIENT_ID`)
    /// - `{PREFIX}_CLIENT_SECRET`
    /// - `{PREFIX}_REDIRECT_URL`
    /// - `{PREFIX}_HOST_MODE` (optional, `demo` or `live`, defaults to `demo`)
    /// - `{PREFIX}_TIMEOUT_SECONDS` (optional, positive, defaults to 10)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let client_id = required_var(&format!("{}_CLIENT_ID", prefix))?;
        let client_secret = required_var(&format!("{}_CLIENT_SECRET", prefix))?;
        let redirect_uri = required_var(&format!("{}_REDIRECT_URL", prefix))?;

        let host_mode_var = format!("{}_HOST_MODE", prefix);
        let host_mode = match env::var(&host_mode_var) {
            Ok(value) => value.parse().map_err(|e| {
                ConfigError::InvalidConfiguration(format!("{}: {}", host_mode_var, e))
            })?,
            Err(_) => HostMode::Demo,
        };

        let timeout_var = format!("{}_TIMEOUT_SECONDS", prefix);
        let request_timeout = match env::var(&timeout_var) {
            Ok(value) => match value.trim().parse::<u64>() {
                Ok(0) => {
                    return Err(ConfigError::InvalidConfiguration(format!(
                        "{}: timeout must be at least one second",
                        timeout_var
                    )))
                }
                Ok(seconds) => Duration::from_secs(seconds),
                Err(e) => {
                    return Err(ConfigError::InvalidConfiguration(format!(
                        "{}: {}",
                        timeout_var, e
                    )))
                }
            },
            Err(_) => DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            client_id,
            client_secret: Secret::new(client_secret),
            redirect_uri,
            host_mode,
            request_timeout,
        })
    }

    /// Create configuration from .env file and environment variables
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create configuration from a specific .env file path
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                // no .env file, fall back to the process environment
            }
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    /// Set host mode
    #[must_use]
    pub const fn host_mode(mut self, host_mode: HostMode) -> Self {
        self.host_mode = host_mode;
        self
    }

    /// Set the per-request response timeout
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check if this configuration carries application credentials
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.expose_secret().is_empty()
    }

    /// Get client secret (use carefully - exposes secret)
    pub fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvironmentVariable(name.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

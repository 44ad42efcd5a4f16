//! Configuration management for the VaultCore client and CLI

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, VaultError};

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_IDENTITY_URL: &str = "http://localhost:8081";
pub const DEFAULT_REALM: &str = "vaultcore";
pub const DEFAULT_CLIENT_ID: &str = "vaultcore-frontend";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:5173/callback";

const ENV_PREFIX: &str = "VAULTCORE";

pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vaultcore")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

pub fn default_session_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vaultcore")
        .join("session.json")
}

fn default_timeout() -> u64 {
    30
}

fn default_use_proxy() -> bool {
    true
}

/// OpenID Connect identity provider settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IdentityConfig {
    pub url: String,
    pub realm: String,
    pub client_id: String,
    /// Where the provider sends the browser back with the authorization code
    pub redirect_uri: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_IDENTITY_URL.to_string(),
            realm: DEFAULT_REALM.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        }
    }
}

impl IdentityConfig {
    /// Base of the realm's OpenID Connect endpoints
    pub fn openid_connect_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect",
            self.url.trim_end_matches('/'),
            self.realm
        )
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClientConfig {
    pub api_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_use_proxy")]
    pub use_proxy: bool,
    /// Session file; `None` keeps the session in memory only
    #[serde(default)]
    pub session_path: Option<PathBuf>,
    #[serde(default)]
    pub identity: IdentityConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: default_timeout(),
            use_proxy: default_use_proxy(),
            session_path: Some(default_session_path()),
            identity: IdentityConfig::default(),
        }
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    api_url: Option<String>,
    timeout: Option<u64>,
    use_proxy: Option<bool>,
    session_path: Option<Option<PathBuf>>,
    identity: Option<IdentityConfig>,
    config_file: Option<PathBuf>,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_url<S: Into<String>>(mut self, api_url: S) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn use_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = Some(use_proxy);
        self
    }

    pub fn session_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.session_path = Some(Some(path.as_ref().to_path_buf()));
        self
    }

    /// Keep the session in memory only
    pub fn in_memory_session(mut self) -> Self {
        self.session_path = Some(None);
        self
    }

    pub fn identity(mut self, identity: IdentityConfig) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_file_and_env(self.config_file.as_deref())?;

        if let Some(api_url) = self.api_url {
            config.api_url = api_url;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(use_proxy) = self.use_proxy {
            config.use_proxy = use_proxy;
        }
        if let Some(session_path) = self.session_path {
            config.session_path = session_path;
        }
        if let Some(identity) = self.identity {
            config.identity = identity;
        }

        config.validate()?;
        Ok(config)
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Load configuration from defaults, an optional file and `VAULTCORE_*`
    /// environment variables, in increasing precedence. Nested keys use `__`,
    /// e.g. `VAULTCORE_IDENTITY__REALM`.
    pub fn from_file_and_env<P: AsRef<Path>>(config_file: Option<P>) -> Result<Self> {
        let defaults = Self::default();
        let session_path = default_session_path().to_string_lossy().to_string();

        let mut builder = Config::builder()
            .set_default("api_url", defaults.api_url.as_str())?
            .set_default("timeout", defaults.timeout)?
            .set_default("use_proxy", defaults.use_proxy)?
            .set_default("session_path", session_path)?
            .set_default("identity.url", defaults.identity.url.as_str())?
            .set_default("identity.realm", defaults.identity.realm.as_str())?
            .set_default("identity.client_id", defaults.identity.client_id.as_str())?
            .set_default("identity.redirect_uri", defaults.identity.redirect_uri.as_str())?;

        if let Some(config_path) = config_file {
            if config_path.as_ref().exists() {
                builder = builder.add_source(File::from(config_path.as_ref()));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load from the given file, or the default location when `None`.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);
        let config = Self::from_file_and_env(Some(&path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_url("API URL", &self.api_url)?;
        validate_url("Identity provider URL", &self.identity.url)?;
        if self.identity.realm.is_empty() {
            return Err(VaultError::config("Identity realm cannot be empty"));
        }
        if self.identity.client_id.is_empty() {
            return Err(VaultError::config("Identity client id cannot be empty"));
        }
        if self.timeout == 0 {
            return Err(VaultError::config("Timeout must be at least one second"));
        }
        Ok(())
    }

    /// Absolute URL of `endpoint` on the API backend
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        let endpoint = endpoint.strip_prefix('/').unwrap_or(endpoint);
        format!("{}/{}", self.api_url.trim_end_matches('/'), endpoint)
    }
}

fn validate_url(what: &str, url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(VaultError::invalid_endpoint(format!("{what} cannot be empty")));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(VaultError::invalid_endpoint(format!(
            "{what} must start with http:// or https://: {url}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_joins_slashes() {
        let config = ClientConfig {
            api_url: "http://localhost:8080/".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(
            config.endpoint_url("/api/wallet"),
            "http://localhost:8080/api/wallet"
        );
        assert_eq!(
            config.endpoint_url("api/wallet"),
            "http://localhost:8080/api/wallet"
        );
        assert_eq!(
            config.endpoint_url("https://other.example/x"),
            "https://other.example/x"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ClientConfig::default();
        assert!(config.validate().is_ok());

        config.api_url = "localhost:8080".to_string();
        assert!(config.validate().is_err());

        let config = ClientConfig {
            timeout: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.identity.realm.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "api_url": "https://api.vaultcore.test", "timeout": 5, "identity": { "realm": "staging" } }"#,
        )
        .unwrap();

        let config = ClientConfig::from_file_and_env(Some(&path)).unwrap();
        assert_eq!(config.api_url, "https://api.vaultcore.test");
        assert_eq!(config.timeout, 5);
        assert_eq!(config.identity.realm, "staging");
        assert_eq!(config.identity.client_id, DEFAULT_CLIENT_ID);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ClientConfig::builder()
            .config_file("/nonexistent/vaultcore.json")
            .api_url("http://127.0.0.1:9000")
            .timeout(3)
            .in_memory_session()
            .build()
            .unwrap();

        assert_eq!(config.api_url, "http://127.0.0.1:9000");
        assert_eq!(config.timeout, 3);
        assert!(config.session_path.is_none());
    }

    #[test]
    fn test_openid_connect_url() {
        let identity = IdentityConfig {
            url: "http://localhost:8081/".to_string(),
            ..IdentityConfig::default()
        };
        assert_eq!(
            identity.openid_connect_url(),
            "http://localhost:8081/realms/vaultcore/protocol/openid-connect"
        );
    }
}

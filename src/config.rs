//! Configuration Management
//!
//! Client settings are layered as JSON objects, later layers winning:
//! the embedded `default.json`, the user's config file, environment
//! variables, and finally explicit caller overrides. The merged object is
//! validated once into an immutable [`ClientConfig`].

use crate::api::auth::Credential;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Embedded default configuration (compiled into the binary)
const DEFAULT_CONFIG: &str = include_str!("resources/default.json");

const DEFAULT_USER_AGENT: &str = concat!("campus/", env!("CARGO_PKG_VERSION"));
const DEFAULT_VERSION: &str = "v1";
const DEFAULT_TIMEOUT_SECS: f64 = 30.0;
const DEFAULT_RETRIES: u32 = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 250;

/// Upper bound on configured retries
pub const MAX_RETRIES: u32 = 10;

/// Environment variables and the config keys they set
const ENV_KEYS: &[(&str, &str)] = &[
    ("CAMPUS_BASE_URL", "base_url"),
    ("CAMPUS_VERSION", "version"),
    ("CAMPUS_TOKEN", "token"),
    ("CAMPUS_CLIENT_ID", "client_id"),
    ("CAMPUS_CLIENT_SECRET", "client_secret"),
];

/// Raw, unvalidated configuration keys
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigValues {
    pub base_url: Option<String>,
    /// API version path prefix, e.g. `v1`
    pub version: Option<String>,
    pub timeout_secs: Option<f64>,
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl ConfigValues {
    fn into_config(self, credential: Option<Credential>) -> Result<ClientConfig> {
        let base_url = match self.base_url.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => return Err(Error::Configuration("missing required `base_url`".to_string())),
        };
        let base_url = Url::parse(&base_url)
            .map_err(|e| Error::Configuration(format!("invalid `base_url` `{}`: {}", base_url, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::Configuration(format!(
                "`base_url` must use http or https, got `{}`",
                base_url.scheme()
            )));
        }

        let credentials = match credential {
            Some(c) => c,
            None => credential_from(self.token, self.client_id, self.client_secret)?,
        };

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if !timeout_secs.is_finite() || timeout_secs <= 0.0 {
            return Err(Error::Configuration(format!(
                "`timeout_secs` must be a positive number, got {}",
                timeout_secs
            )));
        }

        let retries = self.retries.unwrap_or(DEFAULT_RETRIES);
        if retries > MAX_RETRIES {
            return Err(Error::Configuration(format!(
                "`retries` must be at most {}, got {}",
                MAX_RETRIES, retries
            )));
        }

        Ok(ClientConfig {
            base_url,
            version: self.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            timeout: Duration::from_secs_f64(timeout_secs),
            retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS)),
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            credentials,
        })
    }
}

fn credential_from(
    token: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
) -> Result<Credential> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    if let Some(token) = non_empty(token) {
        return Ok(Credential::Bearer(token));
    }

    match (non_empty(client_id), non_empty(client_secret)) {
        (Some(client_id), Some(client_secret)) => Ok(Credential::Basic {
            client_id,
            client_secret,
        }),
        (Some(_), None) | (None, Some(_)) => Err(Error::Configuration(
            "`client_id` and `client_secret` must be given together".to_string(),
        )),
        (None, None) => Err(Error::Configuration(
            "missing credentials: set `token`, or `client_id` and `client_secret`".to_string(),
        )),
    }
}

/// Validated client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub version: String,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
    pub credentials: Credential,
}

impl ClientConfig {
    /// Defaults merged with an explicit base URL and credential
    pub fn new(base_url: &str, credential: Credential) -> Result<Self> {
        let mut merged = default_values()?;
        merge(&mut merged, serde_json::json!({ "base_url": base_url }));
        values_from(merged)?.into_config(Some(credential))
    }

    /// Defaults merged with caller overrides (caller keys win)
    pub fn from_overrides(overrides: Value) -> Result<Self> {
        let mut merged = default_values()?;
        merge(&mut merged, overrides);
        Self::from_value(merged)
    }

    /// Validate a fully merged configuration object
    pub fn from_value(value: Value) -> Result<Self> {
        values_from(value)?.into_config(None)
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Replace the client-wide timeout; zero is rejected
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::Configuration("timeout must be positive".to_string()));
        }
        self.timeout = timeout;
        Ok(self)
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.min(MAX_RETRIES);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

fn values_from(value: Value) -> Result<ConfigValues> {
    serde_json::from_value(value)
        .map_err(|e| Error::Configuration(format!("malformed configuration: {}", e)))
}

/// The embedded defaults as a JSON object
pub fn default_values() -> Result<Value> {
    serde_json::from_str(DEFAULT_CONFIG)
        .map_err(|e| Error::Configuration(format!("failed to parse embedded defaults: {}", e)))
}

/// Deep-merge `overlay` into `base`; overlay keys take precedence
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge(existing, value)
                    }
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Get the user config file path
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("campus").join("config.json"))
}

/// Load a JSON config file; a missing file is an empty layer
pub fn load_file(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Configuration(format!("failed to read {}: {}", path.display(), e))
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|e| {
        Error::Configuration(format!("failed to parse {}: {}", path.display(), e))
    })?;

    if !value.is_object() {
        return Err(Error::Configuration(format!(
            "{} must contain a JSON object",
            path.display()
        )));
    }
    Ok(value)
}

/// Overrides taken from `CAMPUS_*` environment variables
pub fn env_overrides<F>(lookup: F) -> Value
where
    F: Fn(&str) -> Option<String>,
{
    let mut map = Map::new();
    for (var, key) in ENV_KEYS {
        if let Some(value) = lookup(var) {
            map.insert(key.to_string(), Value::String(value));
        }
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_parse() {
        let defaults = default_values().unwrap();
        assert!(defaults.get("base_url").is_some());
        assert!(values_from(defaults).is_ok());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = ClientConfig::from_overrides(json!({})).unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("credentials")));
    }

    #[test]
    fn test_missing_base_url_rejected() {
        let err = ClientConfig::from_overrides(json!({"base_url": null, "token": "t"})).unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("base_url")));

        let err = ClientConfig::from_overrides(json!({"base_url": "  ", "token": "t"})).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config = ClientConfig::from_overrides(json!({
            "base_url": "https://campus.example.com",
            "token": "abc",
            "retries": 5,
            "timeout_secs": 2.5
        }))
        .unwrap();

        assert_eq!(config.base_url.as_str(), "https://campus.example.com/");
        assert_eq!(config.retries, 5);
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.credentials, Credential::Bearer("abc".to_string()));
        assert_eq!(config.version, "v1");
    }

    #[test]
    fn test_basic_credentials() {
        let config = ClientConfig::from_overrides(json!({
            "client_id": "uid-client-abcd1234",
            "client_secret": "s3cret"
        }))
        .unwrap();
        assert!(matches!(config.credentials, Credential::Basic { .. }));

        let err = ClientConfig::from_overrides(json!({"client_id": "uid-client-abcd1234"}))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("together")));
    }

    #[test]
    fn test_invalid_values_rejected() {
        for overrides in [
            json!({"token": "t", "base_url": "ftp://example.com"}),
            json!({"token": "t", "base_url": "not a url"}),
            json!({"token": "t", "timeout_secs": 0}),
            json!({"token": "t", "retries": MAX_RETRIES + 1}),
            json!({"token": "t", "retires": 3}),
        ] {
            assert!(
                matches!(ClientConfig::from_overrides(overrides.clone()), Err(Error::Configuration(_))),
                "expected configuration error for {}",
                overrides
            );
        }
    }

    #[test]
    fn test_deep_merge() {
        let mut base = json!({"a": {"x": 1, "y": 2}, "b": 1});
        merge(&mut base, json!({"a": {"y": 3}, "c": 4}));
        assert_eq!(base, json!({"a": {"x": 1, "y": 3}, "b": 1, "c": 4}));

        merge(&mut base, json!({"a": null}));
        assert_eq!(base["a"], Value::Null);
    }

    #[test]
    fn test_env_overrides() {
        let env = env_overrides(|var| match var {
            "CAMPUS_BASE_URL" => Some("http://localhost:8080".to_string()),
            "CAMPUS_TOKEN" => Some("env-token".to_string()),
            _ => None,
        });
        assert_eq!(
            env,
            json!({"base_url": "http://localhost:8080", "token": "env-token"})
        );
    }

    #[test]
    fn test_load_file() {
        let dir = std::env::temp_dir().join(format!("campus-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let missing = dir.join("missing.json");
        assert_eq!(load_file(&missing).unwrap(), json!({}));

        let good = dir.join("good.json");
        std::fs::write(&good, r#"{"token": "file-token"}"#).unwrap();
        assert_eq!(load_file(&good).unwrap(), json!({"token": "file-token"}));

        let bad = dir.join("bad.json");
        std::fs::write(&bad, "[1, 2]").unwrap();
        assert!(load_file(&bad).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_builder_methods() {
        let config = ClientConfig::new("http://localhost:5000", Credential::Bearer("t".to_string()))
            .unwrap()
            .with_version("v2")
            .with_retries(100)
            .with_retry_delay(Duration::ZERO)
            .with_timeout(Duration::from_secs(1))
            .unwrap();
        assert_eq!(config.version, "v2");
        assert_eq!(config.retries, MAX_RETRIES);
        assert_eq!(config.retry_delay, Duration::ZERO);
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ClientConfig::new("http://localhost:5000", Credential::Bearer("t".to_string()))
            .unwrap();
        let err = config.with_timeout(Duration::ZERO).unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("timeout")));
    }
}

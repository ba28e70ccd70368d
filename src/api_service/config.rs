use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::api_service::errors::ApiServiceError;
use crate::api_service::request::Method;

/// Base URLs requests are resolved against
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BaseUrl {
    /// Production API
    pub real: String,
    /// Mock API, selected per call with `use_mock_base_url`
    pub mock: String,
}

impl Default for BaseUrl {
    fn default() -> Self {
        Self {
            real: "http://localhost:8080".to_string(),
            mock: "http://localhost:8081".to_string(),
        }
    }
}

/// A static header sent with requests (client secret, client id)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeaderCredential {
    pub header_name: String,
    pub value: String,
}

impl HeaderCredential {
    fn named(header_name: &str) -> Self {
        Self {
            header_name: header_name.to_string(),
            value: String::new(),
        }
    }
}

/// Where a token lives in storage and how it is sent
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenSlot {
    /// Storage key holding the raw token
    pub storage_key: String,
    /// Header the token is sent in
    pub header_name: String,
    /// Prepended to the stored token, e.g. `"Bearer "`
    pub prefix: String,
}

impl Default for TokenSlot {
    fn default() -> Self {
        Self {
            storage_key: "access_token".to_string(),
            header_name: "Authorization".to_string(),
            prefix: "Bearer ".to_string(),
        }
    }
}

/// Refresh-token handling
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenConfig {
    /// Master switch; per-call `disable_refresh_token` can only turn it off
    pub active: bool,
    /// Route the refresh request is sent to
    pub url: String,
    pub method: Method,
    pub token: TokenSlot,
    /// Failure statuses that fire the refresh, scanned in order.
    /// An empty list disables refresh.
    pub on_status: Vec<u16>,
}

impl Default for RefreshTokenConfig {
    fn default() -> Self {
        Self {
            active: true,
            url: String::new(),
            method: Method::Post,
            token: TokenSlot {
                storage_key: "refresh_token".to_string(),
                header_name: "X-Refresh-Token".to_string(),
                prefix: String::new(),
            },
            on_status: vec![401, 403],
        }
    }
}

/// Service configuration, read-only once handed to `ApiService::new`
///
/// Deserializing merges whatever fields are present over [`Config::default`],
/// at any nesting depth.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "ConfigFile")]
pub struct Config {
    pub base_url: BaseUrl,
    pub client_secret: HeaderCredential,
    /// Sent on every request when `value` is non-empty, unless disabled per call
    pub client_id: HeaderCredential,
    pub access_token: TokenSlot,
    pub refresh_token: RefreshTokenConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: BaseUrl::default(),
            client_secret: HeaderCredential::named("X-Client-Secret"),
            client_id: HeaderCredential::named("X-Client-Id"),
            access_token: TokenSlot::default(),
            refresh_token: RefreshTokenConfig::default(),
        }
    }
}

impl Config {
    /// Default configuration pointed at the given real base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.base_url.real = base_url.into();
        config
    }

    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ApiServiceError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `API_SERVICE_*` environment variables on top
    /// of the defaults
    pub fn from_env() -> Result<Self, ApiServiceError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ApiServiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("API_SERVICE_BASE_URL") {
            config.base_url.real = url;
        }
        if let Some(url) = lookup("API_SERVICE_MOCK_BASE_URL") {
            config.base_url.mock = url;
        }
        if let Some(secret) = lookup("API_SERVICE_CLIENT_SECRET") {
            config.client_secret.value = secret;
        }
        if let Some(id) = lookup("API_SERVICE_CLIENT_ID") {
            config.client_id.value = id;
        }
        if let Some(url) = lookup("API_SERVICE_REFRESH_URL") {
            config.refresh_token.url = url;
        }
        if let Some(active) = lookup("API_SERVICE_REFRESH_ACTIVE") {
            config.refresh_token.active = parse_flag(&active)?;
        }
        if let Some(statuses) = lookup("API_SERVICE_REFRESH_ON_STATUS") {
            config.refresh_token.on_status = parse_status_list(&statuses)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that both base URLs are absolute URLs and that every
    /// injected header has a name
    pub fn validate(&self) -> Result<(), ApiServiceError> {
        for (name, value) in [("real", &self.base_url.real), ("mock", &self.base_url.mock)] {
            url::Url::parse(value).map_err(|e| {
                ApiServiceError::Configuration(format!(
                    "Invalid {} base URL '{}': {}",
                    name, value, e
                ))
            })?;
        }

        for (name, header_name) in [
            ("clientSecret", &self.client_secret.header_name),
            ("clientId", &self.client_id.header_name),
            ("accessToken", &self.access_token.header_name),
            ("refreshToken.token", &self.refresh_token.token.header_name),
        ] {
            if header_name.trim().is_empty() {
                return Err(ApiServiceError::Configuration(format!(
                    "Empty header name for {}",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Serialized shape of [`Config`]: every field optional
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ConfigFile {
    base_url: BaseUrlFile,
    client_secret: HeaderCredentialFile,
    client_id: HeaderCredentialFile,
    access_token: TokenSlotFile,
    refresh_token: RefreshTokenFile,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct BaseUrlFile {
    real: Option<String>,
    mock: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct HeaderCredentialFile {
    header_name: Option<String>,
    value: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct TokenSlotFile {
    storage_key: Option<String>,
    header_name: Option<String>,
    prefix: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RefreshTokenFile {
    active: Option<bool>,
    url: Option<String>,
    method: Option<Method>,
    token: TokenSlotFile,
    on_status: Option<Vec<u16>>,
}

fn merge<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

impl HeaderCredentialFile {
    fn merge_into(self, target: &mut HeaderCredential) {
        merge(&mut target.header_name, self.header_name);
        merge(&mut target.value, self.value);
    }
}

impl TokenSlotFile {
    fn merge_into(self, target: &mut TokenSlot) {
        merge(&mut target.storage_key, self.storage_key);
        merge(&mut target.header_name, self.header_name);
        merge(&mut target.prefix, self.prefix);
    }
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        let mut config = Config::default();

        merge(&mut config.base_url.real, file.base_url.real);
        merge(&mut config.base_url.mock, file.base_url.mock);
        file.client_secret.merge_into(&mut config.client_secret);
        file.client_id.merge_into(&mut config.client_id);
        file.access_token.merge_into(&mut config.access_token);

        let refresh = &mut config.refresh_token;
        merge(&mut refresh.active, file.refresh_token.active);
        merge(&mut refresh.url, file.refresh_token.url);
        merge(&mut refresh.method, file.refresh_token.method);
        file.refresh_token.token.merge_into(&mut refresh.token);
        merge(&mut refresh.on_status, file.refresh_token.on_status);

        config
    }
}

fn parse_flag(value: &str) -> Result<bool, ApiServiceError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ApiServiceError::Configuration(format!(
            "Invalid boolean value '{}'",
            other
        ))),
    }
}

fn parse_status_list(value: &str) -> Result<Vec<u16>, ApiServiceError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u16>().map_err(|e| {
                ApiServiceError::Configuration(format!("Invalid status code '{}': {}", s, e))
            })
        })
        .collect()
}

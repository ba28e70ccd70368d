//! REST call helper with auth header injection and token refresh
//!
//! `ApiService` assembles headers from an injected [`Config`] and
//! [`TokenStorage`], issues one of five HTTP verbs against the configured
//! base URL, and settles the call into exactly one of the caller's
//! callbacks. Failures whose status is listed in
//! `config.refresh_token.on_status` fire a background refresh call.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use api_service::{ApiRequest, ApiService, Callback, Config, MemoryStorage, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = Arc::new(MemoryStorage::with_items([("access_token", "abc")]));
//!     let service = ApiService::new(Config::new("https://api.example.com"), storage)?;
//!
//!     let request = ApiRequest::new("/users", "GET")
//!         .callback(Callback::new(
//!             |res, _| println!("users: {}", res.data),
//!             |err, extra| eprintln!("failed: {} ({:?})", err, extra),
//!         ))
//!         .options(RequestOptions {
//!             use_access_token: true,
//!             ..Default::default()
//!         });
//!
//!     service.call(request).await?;
//!     Ok(())
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use tokio::task::JoinHandle;
use uuid::Uuid;

// Internal modules
mod config;
mod errors;
mod notify;
mod refresh;
mod request;
mod response;
mod storage;

// Public re-exports
pub use config::{BaseUrl, Config, HeaderCredential, RefreshTokenConfig, TokenSlot};
pub use errors::{ApiServiceError, ErrorResponse, RequestError, RequestErrorKind};
pub use notify::{LogNotifier, Notifier, ToastKind};
pub use refresh::{LogRefreshHandler, RefreshHandler, RefreshTask};
pub use request::{
    ApiRequest, Callback, ClientOptions, ExtraData, FailHandler, Method, RequestData,
    RequestOptions, SuccessHandler, Toast, REFRESH_TRIGGERED_KEY,
};
pub use response::ApiResponse;
pub use storage::{FileStorage, MemoryStorage, TokenStorage};

use request::{join_url, ValidatedCall};

/// How a single call settled
#[derive(Debug)]
pub enum Settlement {
    /// 2xx response; `on_success` has run
    Success {
        /// Decoded response handed to `on_success`
        response: ApiResponse,
    },
    /// Anything else; `on_fail` has run
    Failure {
        /// Error handed to `on_fail`
        error: RequestError,
        /// Background refresh fired by this failure, if any
        refresh: Option<RefreshTask>,
    },
}

impl Settlement {
    pub fn is_success(&self) -> bool {
        matches!(self, Settlement::Success { .. })
    }

    pub fn refresh_triggered(&self) -> bool {
        matches!(self, Settlement::Failure { refresh: Some(_), .. })
    }

    /// Take the refresh handle out, leaving the rest of the settlement behind
    pub fn into_refresh(self) -> Option<RefreshTask> {
        match self {
            Settlement::Failure { refresh, .. } => refresh,
            Settlement::Success { .. } => None,
        }
    }
}

/// Fully assembled request, before it is handed to reqwest
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub params: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

/// The request dispatcher
#[derive(Clone)]
pub struct ApiService {
    config: Arc<Config>,
    http_client: Client,
    storage: Arc<dyn TokenStorage>,
    notifier: Arc<dyn Notifier>,
    refresh_handler: Arc<dyn RefreshHandler>,
}

impl std::fmt::Debug for ApiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiService")
            .field("config", &self.config)
            .field("http_client", &"<http_client>")
            .field("storage", &"<storage>")
            .field("notifier", &"<notifier>")
            .field("refresh_handler", &"<refresh_handler>")
            .finish()
    }
}

impl ApiService {
    /// Create a service with the given configuration and token storage
    pub fn new(config: Config, storage: Arc<dyn TokenStorage>) -> Result<Self, ApiServiceError> {
        config.validate()?;

        let http_client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
            storage,
            notifier: Arc::new(LogNotifier),
            refresh_handler: Arc::new(LogRefreshHandler),
        })
    }

    /// Create a service backed by in-process token storage
    pub fn with_memory_storage(config: Config) -> Result<Self, ApiServiceError> {
        Self::new(config, Arc::new(MemoryStorage::new()))
    }

    /// Create a service backed by `tokens.json` in `storage_dir`
    pub fn with_file_storage(config: Config, storage_dir: PathBuf) -> Result<Self, ApiServiceError> {
        Self::new(config, Arc::new(FileStorage::new(storage_dir)))
    }

    /// Use a preconfigured reqwest client (proxies, TLS roots, ...)
    pub fn with_http_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_refresh_handler(mut self, refresh_handler: Arc<dyn RefreshHandler>) -> Self {
        self.refresh_handler = refresh_handler;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn TokenStorage> {
        &self.storage
    }

    /// Issue a request and wait for it to settle
    ///
    /// Only malformed call sites return `Err`; request failures are routed
    /// to `on_fail` and reported as `Settlement::Failure`.
    pub async fn call(&self, request: ApiRequest) -> Result<Settlement, ApiServiceError> {
        let call = request.validate()?;
        Ok(self.settle(call).await)
    }

    /// Issue a request without waiting for it
    ///
    /// Validation happens before this returns; settlement runs on a spawned
    /// tokio task. Must be called from within a tokio runtime.
    pub fn dispatch(&self, request: ApiRequest) -> Result<JoinHandle<Settlement>, ApiServiceError> {
        let call = request.validate()?;
        let service = self.clone();
        Ok(tokio::spawn(async move { service.settle(call).await }))
    }

    pub(crate) async fn settle(&self, call: ValidatedCall) -> Settlement {
        let request_id = Uuid::new_v4();

        let result = match self.prepare(&call).await {
            Ok(prepared) => {
                log::debug!("[{}] {} {}", request_id, prepared.method, prepared.url);
                self.send(&prepared).await
            }
            Err(error) => Err(error),
        };

        match result {
            Ok(response) => {
                self.handle_success(&call, &response, request_id).await;
                Settlement::Success { response }
            }
            Err(error) => {
                let refresh = self.handle_failure(&call, &error, request_id).await;
                Settlement::Failure { error, refresh }
            }
        }
    }

    /// Assemble headers, URL, params and body for a call
    pub(crate) async fn prepare(&self, call: &ValidatedCall) -> Result<PreparedRequest, RequestError> {
        let config = &self.config;
        let options = &call.options;
        let mut headers = header_map(&call.data.headers)?;

        if call.send_refresh_token {
            let slot = &config.refresh_token.token;
            let token = self.read_token(&slot.storage_key).await?;
            insert_header(&mut headers, &slot.header_name, &format!("{}{}", slot.prefix, token))?;
        }
        if options.use_client_secret {
            insert_header(
                &mut headers,
                &config.client_secret.header_name,
                &config.client_secret.value,
            )?;
        }
        if options.use_access_token {
            let slot = &config.access_token;
            let token = self.read_token(&slot.storage_key).await?;
            insert_header(&mut headers, &slot.header_name, &format!("{}{}", slot.prefix, token))?;
        }
        if !config.client_id.value.is_empty() && !options.disable_client_id {
            insert_header(&mut headers, &config.client_id.header_name, &config.client_id.value)?;
        }

        let mut base_url = if options.use_mock_base_url {
            config.base_url.mock.clone()
        } else {
            config.base_url.real.clone()
        };
        let mut params = call.data.params.clone();
        let mut body = if call.method.sends_body() {
            Some(call.data.body.clone().unwrap_or_else(|| Value::Object(Default::default())))
        } else {
            None
        };

        // Pass-through options win over everything assembled above
        let overrides = &call.data.options;
        if let Some(url) = &overrides.base_url {
            base_url = url.clone();
        }
        if let Some(h) = &overrides.headers {
            headers = header_map(h)?;
        }
        if let Some(p) = &overrides.params {
            params = p.clone();
        }
        if let Some(b) = &overrides.body {
            body = Some(b.clone());
        }

        Ok(PreparedRequest {
            method: call.method,
            url: join_url(&base_url, &call.url),
            headers,
            params,
            body,
            timeout: overrides.timeout,
        })
    }

    async fn send(&self, prepared: &PreparedRequest) -> Result<ApiResponse, RequestError> {
        let mut builder = self
            .http_client
            .request(prepared.method.as_reqwest(), prepared.url.as_str())
            .headers(prepared.headers.clone());
        if !prepared.params.is_empty() {
            builder = builder.query(&prepared.params);
        }
        if let Some(body) = &prepared.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = prepared.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        response::settle_response(response).await
    }

    /// Read a token for header injection. A missing token is sent as an
    /// empty string after the prefix.
    pub(crate) async fn read_token(&self, key: &str) -> Result<String, RequestError> {
        match self.storage.get_item(key).await? {
            Some(token) => Ok(token),
            None => {
                log::warn!("No token stored under '{}', sending empty value", key);
                Ok(String::new())
            }
        }
    }

    async fn handle_success(&self, call: &ValidatedCall, response: &ApiResponse, request_id: Uuid) {
        log::debug!("[{}] settled with status {}", request_id, response.status);

        (call.on_success)(response, call.extra_data.as_ref());

        if !call.options.toast.success.is_empty() {
            self.notifier
                .notify(&call.options.toast.success, ToastKind::Success);
        }
        if call.options.delete_access_token_after_success {
            self.remove_access_token(request_id).await;
        }
    }

    async fn handle_failure(
        &self,
        call: &ValidatedCall,
        error: &RequestError,
        request_id: Uuid,
    ) -> Option<RefreshTask> {
        let refresh_config = &self.config.refresh_token;
        let mut refresh_task = None;

        if refresh_config.active && !call.options.disable_refresh_token {
            if let Some(status) = error.status() {
                if let Some(trigger) = refresh_config.on_status.iter().find(|s| **s == status) {
                    log::info!("[{}] status {} triggers token refresh", request_id, trigger);
                    refresh_task = Some(refresh::spawn_refresh(self.clone()));
                }
            }
        }

        let mut extra = call.extra_data.clone().unwrap_or_default();
        extra.insert(
            REFRESH_TRIGGERED_KEY.to_string(),
            Value::Bool(refresh_task.is_some()),
        );
        (call.on_fail)(error, &extra);

        if !call.options.toast.fail.is_empty() {
            self.notifier.notify(&call.options.toast.fail, ToastKind::Error);
        }
        if call.options.delete_access_token_after_fail {
            self.remove_access_token(request_id).await;
        }
        if !call.options.disable_log_on_error {
            log::error!(
                "[{}] {} {} failed: {}",
                request_id,
                call.method,
                call.url,
                error
            );
        }

        refresh_task
    }

    async fn remove_access_token(&self, request_id: Uuid) {
        let key = &self.config.access_token.storage_key;
        if let Err(e) = self.storage.remove_item(key).await {
            log::warn!("[{}] failed to remove '{}' from storage: {}", request_id, key, e);
        }
    }
}

/// Build a header map from caller-supplied headers. Names are applied in
/// sorted order so that names differing only in case resolve the same way
/// on every call.
fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, RequestError> {
    let mut names: Vec<&String> = headers.keys().collect();
    names.sort();

    let mut map = HeaderMap::new();
    for name in names {
        insert_header(&mut map, name, &headers[name])?;
    }
    Ok(map)
}

/// Insert or replace a header. Header names are case-insensitive, so the
/// last insert wins regardless of spelling.
fn insert_header(map: &mut HeaderMap, name: &str, value: &str) -> Result<(), RequestError> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
        RequestError::new(
            RequestErrorKind::InvalidRequest,
            format!("Invalid header name '{}': {}", name, e),
        )
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| {
        RequestError::new(
            RequestErrorKind::InvalidRequest,
            format!("Invalid value for header '{}': {}", name, e),
        )
    })?;
    map.insert(header_name, header_value);
    Ok(())
}

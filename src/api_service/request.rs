use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api_service::errors::{ApiServiceError, RequestError};
use crate::api_service::response::ApiResponse;

/// Opaque caller payload threaded into both outcome callbacks
pub type ExtraData = serde_json::Map<String, Value>;

/// Key added to the extra data handed to `on_fail`
pub const REFRESH_TRIGGERED_KEY: &str = "refreshTriggered";

pub type SuccessHandler = Arc<dyn Fn(&ApiResponse, Option<&ExtraData>) + Send + Sync>;
pub type FailHandler = Arc<dyn Fn(&RequestError, &ExtraData) + Send + Sync>;

/// Supported HTTP verbs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }

    /// GET requests never carry a body
    pub fn sends_body(&self) -> bool {
        !matches!(self, Method::Get)
    }

    pub(crate) fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ApiServiceError;

    /// Only the exact uppercase verb names are accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            other => Err(ApiServiceError::InvalidMethod(other.to_string())),
        }
    }
}

/// Outcome handlers plus the payload forwarded into them
#[derive(Clone, Default)]
pub struct Callback {
    on_success: Option<SuccessHandler>,
    on_fail: Option<FailHandler>,
    extra_data: Option<ExtraData>,
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("on_success", &self.on_success.as_ref().map(|_| "<handler>"))
            .field("on_fail", &self.on_fail.as_ref().map(|_| "<handler>"))
            .field("extra_data", &self.extra_data)
            .finish()
    }
}

impl Callback {
    /// Create a callback pair with both handlers set
    pub fn new<S, F>(on_success: S, on_fail: F) -> Self
    where
        S: Fn(&ApiResponse, Option<&ExtraData>) + Send + Sync + 'static,
        F: Fn(&RequestError, &ExtraData) + Send + Sync + 'static,
    {
        Self::default().on_success(on_success).on_fail(on_fail)
    }

    pub fn on_success<S>(mut self, handler: S) -> Self
    where
        S: Fn(&ApiResponse, Option<&ExtraData>) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(handler));
        self
    }

    pub fn on_fail<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RequestError, &ExtraData) + Send + Sync + 'static,
    {
        self.on_fail = Some(Arc::new(handler));
        self
    }

    pub fn extra_data(mut self, extra_data: ExtraData) -> Self {
        self.extra_data = Some(extra_data);
        self
    }
}

/// Options handed straight to the HTTP layer. Applied last, so any field
/// set here replaces what the service assembled.
#[derive(Clone, Debug, Default)]
pub struct ClientOptions {
    pub base_url: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    pub params: Option<BTreeMap<String, String>>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

/// Headers, body, query parameters and pass-through client options
#[derive(Clone, Debug, Default)]
pub struct RequestData {
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
    pub params: BTreeMap<String, String>,
    pub options: ClientOptions,
}

impl RequestData {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }
}

/// Notification messages; empty strings emit nothing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Toast {
    pub success: String,
    pub fail: String,
}

/// Per-call behaviour flags
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub toast: Toast,
    pub use_client_secret: bool,
    pub disable_client_id: bool,
    pub use_access_token: bool,
    pub disable_log_on_error: bool,
    pub delete_access_token_after_success: bool,
    pub delete_access_token_after_fail: bool,
    pub use_mock_base_url: bool,
    pub disable_refresh_token: bool,
}

/// One call to `ApiService`
#[derive(Clone, Debug, Default)]
pub struct ApiRequest {
    /// Path joined onto the base URL, or an absolute URL
    pub url: Option<String>,
    /// Raw verb, validated when the request is issued
    pub method: String,
    pub callback: Option<Callback>,
    pub data: RequestData,
    pub options: RequestOptions,
}

impl ApiRequest {
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            method: method.into(),
            ..Self::default()
        }
    }

    pub fn callback(mut self, callback: Callback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn data(mut self, data: RequestData) -> Self {
        self.data = data;
        self
    }

    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Reject malformed call sites before any I/O
    pub(crate) fn validate(self) -> Result<ValidatedCall, ApiServiceError> {
        let url = self.url.ok_or(ApiServiceError::MissingUrl)?;
        let method = self.method.parse::<Method>()?;
        let callback = self.callback.ok_or(ApiServiceError::MissingCallback)?;
        let on_success = callback
            .on_success
            .ok_or(ApiServiceError::MissingSuccessHandler)?;
        let on_fail = callback.on_fail.ok_or(ApiServiceError::MissingFailHandler)?;

        Ok(ValidatedCall {
            url,
            method,
            on_success,
            on_fail,
            extra_data: callback.extra_data,
            data: self.data,
            options: self.options,
            send_refresh_token: false,
        })
    }
}

pub(crate) struct ValidatedCall {
    pub url: String,
    pub method: Method,
    pub on_success: SuccessHandler,
    pub on_fail: FailHandler,
    pub extra_data: Option<ExtraData>,
    pub data: RequestData,
    pub options: RequestOptions,
    /// Add the configured refresh-token header ahead of the other injections
    pub send_refresh_token: bool,
}

/// Resolve `path` against `base`. Absolute URLs are used as-is; otherwise
/// exactly one `/` separates the two parts.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

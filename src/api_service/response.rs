use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api_service::errors::{ErrorResponse, RequestError};

/// A successful (2xx) response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    /// Parsed JSON body; non-JSON bodies become a JSON string, empty ones `null`
    pub data: Value,
}

impl ApiResponse {
    /// Deserialize `data` into a typed value
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

/// Read a reqwest response, splitting it into success and failure
pub(crate) async fn settle_response(
    response: reqwest::Response,
) -> Result<ApiResponse, RequestError> {
    let status = response.status();
    let headers = collect_headers(response.headers());
    let text = response.text().await?;
    let data = parse_body(&text);

    if status.is_success() {
        Ok(ApiResponse {
            status: status.as_u16(),
            headers,
            data,
        })
    } else {
        Err(RequestError::from_response(ErrorResponse {
            status: status.as_u16(),
            headers,
            data,
        }))
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

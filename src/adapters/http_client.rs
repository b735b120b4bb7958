use std::collections::HashMap;
use std::time::Duration;

use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::error::{json_error, GatewayResult};

/// Header carrying the bearer credential
pub const AUTHORIZATION_HEADER: &str = "Authorization";
/// Default content type header
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// Description of an outbound HTTP call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    method: Method,
    /// Path relative to the API base URL, or an absolute URL
    url: String,
    /// Request headers
    headers: HashMap<String, String>,
    /// Optional JSON body
    body: Option<Value>,
    /// Set once the request has been replayed after a refresh
    retried: bool,
}

impl ApiRequest {
    /// Create a new request with the default JSON content type
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let mut headers = HashMap::new();
        headers.insert(CONTENT_TYPE_HEADER.to_string(), "application/json".to_string());
        Self {
            method,
            url: url.into(),
            headers,
            body: None,
            retried: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Attach a JSON body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> GatewayResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Add a header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Whether this request was already replayed after a refresh
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Set the bearer credential
    pub(crate) fn set_bearer(&mut self, token: &str) {
        self.headers
            .insert(AUTHORIZATION_HEADER.to_string(), format!("Bearer {}", token));
    }

    /// Drop the bearer credential
    pub(crate) fn clear_bearer(&mut self) {
        self.headers.remove(AUTHORIZATION_HEADER);
    }

    /// The bearer token currently attached, if any
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION_HEADER)
            .and_then(|value| value.strip_prefix("Bearer "))
    }
}

/// Resolve a request URL against the API base URL
pub fn join_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

/// Response data returned by an [`HttpClient`]
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    status_code: u16,
    /// Response body
    body: String,
    /// Response headers, names lowercased
    headers: HashMap<String, String>,
}

impl ApiResponse {
    /// Create a new response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status_code: status,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_lowercase(), value.into());
        self
    }

    /// Get the status code
    pub fn status(&self) -> u16 {
        self.status_code
    }

    /// Get a reference to the response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Get a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Get the body as text (consumes the response)
    pub fn text(self) -> String {
        self.body
    }

    /// Parse body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> GatewayResult<T> {
        serde_json::from_str(&self.body).map_err(|e| json_error(&e))
    }

    /// Check if successful (2xx status)
    pub fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }
}

/// Transport used by the gateway, allowing for mocking.
///
/// Implementations return every HTTP response as `Ok`, whatever its status;
/// `Err` is reserved for transport failures.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, url: &str, request: &ApiRequest) -> GatewayResult<ApiResponse>;
}

/// Implementation of HttpClient using reqwest
pub struct ReqwestHttpClient {
    /// Internal reqwest client
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a new ReqwestHttpClient
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a client whose requests time out after `timeout`
    pub fn with_timeout(timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, url: &str, request: &ApiRequest) -> GatewayResult<ApiResponse> {
        trace!(method = %request.method(), url = %url, "Sending HTTP request");
        let mut builder = self.client.request(request.method().clone(), url);

        for (key, value) in request.headers() {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.text().await?;

        let result = headers
            .into_iter()
            .fold(ApiResponse::new(status, body), |resp, (k, v)| resp.with_header(k, v));
        Ok(result)
    }
}

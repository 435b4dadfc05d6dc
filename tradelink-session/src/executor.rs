//! Request executor
//!
//! Issues one logical HTTP call against the configured backend, retrying
//! transport failures and 5xx responses with linear backoff.

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, RequestBody};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use tradelink_core::{retry_async, ClientConfig, ErrorContext, TradelinkError, TradelinkResult};

/// Message of the object substituted for a body that is not valid JSON
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON response";

/// Method, headers and body of a logical call
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post_json(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: RequestBody::Json(body),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Attach `Authorization: Bearer <token>`
    pub fn bearer(mut self, token: &str) -> Self {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => {
                self.headers.insert(AUTHORIZATION, value);
            }
            Err(e) => warn!(error = %e, "Token is not a valid header value, sending without it"),
        }
        self
    }

    /// Set an additional header; invalid names or values are skipped
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        } else {
            warn!(header = name, "Skipping invalid header");
        }
        self
    }
}

/// Parse a response body, substituting a sentinel for anything that is not JSON
pub fn parse_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap_or_else(|_| json!({ "message": INVALID_JSON_MESSAGE }))
}

/// Server-provided error message, if any
fn server_message(body: &Value) -> Option<String> {
    ["message", "detail", "error"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|value| value.as_str())
        .filter(|message| !message.is_empty() && *message != INVALID_JSON_MESSAGE)
        .map(str::to_string)
}

/// Turn a non-2xx response into a classified error
fn classify_failure(status: u16, body: &Value, url: &str) -> TradelinkError {
    let message = server_message(body).unwrap_or_else(|| format!("HTTP error! status: {}", status));
    let context = ErrorContext::new("request_executor")
        .with_operation("execute")
        .with_metadata("url", url)
        .with_metadata("status", &status.to_string());

    if status >= 500 {
        TradelinkError::Server {
            status,
            message,
            context: context.with_suggestion("The backend is failing; retry later"),
        }
    } else {
        TradelinkError::Client {
            status,
            message,
            context: context.with_suggestion(match status {
                401 => "Sign in again or refresh the access token",
                403 => "Check the account's role and permissions",
                404 => "Check the endpoint path in the configuration",
                _ => "Check the request payload",
            }),
        }
    }
}

/// Resilient HTTP executor bound to one backend configuration
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    config: Arc<ClientConfig>,
}

impl RequestExecutor {
    /// Create an executor using the `reqwest` transport
    pub fn new(config: ClientConfig) -> TradelinkResult<Self> {
        let transport = ReqwestTransport::new(&config.api)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create an executor over a custom transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Execute a call, retrying transient failures per the configured policy
    pub async fn execute(&self, endpoint: &str, options: RequestOptions) -> TradelinkResult<Value> {
        let request = self.build_request(endpoint, options);
        let request = &request;

        retry_async(
            move |attempt| self.attempt(request, attempt),
            &self.config.retry,
            endpoint,
        )
        .await
    }

    fn build_request(&self, endpoint: &str, options: RequestOptions) -> HttpRequest {
        let mut headers = options.headers;

        // Multipart bodies carry their own boundary in the content type
        if options.body.is_multipart() {
            headers.remove(CONTENT_TYPE);
        } else {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        HttpRequest {
            method: options.method,
            url: self.config.endpoint_url(endpoint),
            headers,
            body: options.body,
        }
    }

    async fn attempt(&self, request: &HttpRequest, attempt: usize) -> TradelinkResult<Value> {
        debug!(
            method = %request.method,
            url = %request.url,
            attempt = attempt,
            "Executing request"
        );

        let HttpResponse { status, body } = self.transport.send(request.clone()).await?;
        let body = parse_body(&body);

        if (200..300).contains(&status) {
            return Ok(body);
        }

        Err(classify_failure(status, &body, &request.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_config, ScriptedTransport};
    use crate::transport::MultipartBody;
    use tradelink_core::{RetryPolicy, MAX_RETRIES};

    fn executor(transport: &Arc<ScriptedTransport>) -> RequestExecutor {
        RequestExecutor::with_transport(test_config(), transport.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_server_errors_with_linear_delays() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("/products/", 500, json!({}));
        transport.respond("/products/", 502, json!({}));
        transport.respond("/products/", 200, json!({ "items": [] }));

        let result = executor(&transport)
            .execute("/products/", RequestOptions::get())
            .await
            .unwrap();

        assert_eq!(result, json!({ "items": [] }));
        assert_eq!(transport.count("/products/"), 3);
        assert_eq!(transport.gaps_ms("/products/"), vec![1000, 2000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_are_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail("/products/");
        transport.respond("/products/", 200, json!({ "ok": true }));

        let result = executor(&transport)
            .execute("/products/", RequestOptions::get())
            .await;

        assert!(result.is_ok());
        assert_eq!(transport.count("/products/"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_last_error() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..=MAX_RETRIES {
            transport.respond("/products/", 503, json!({ "message": "maintenance" }));
        }

        let result = executor(&transport)
            .execute("/products/", RequestOptions::get())
            .await;

        match result {
            Err(TradelinkError::Server {
                status, message, ..
            }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("Expected Server error, got {:?}", other),
        }
        assert_eq!(transport.count("/products/"), MAX_RETRIES + 1);
        assert_eq!(transport.gaps_ms("/products/"), vec![1000, 2000, 3000]);
    }

    #[tokio::test]
    async fn test_client_errors_are_terminal() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("/categories/", 404, json!({ "message": "Category not found" }));

        let result = executor(&transport)
            .execute("/categories/", RequestOptions::get())
            .await;

        match result {
            Err(TradelinkError::Client {
                status, message, ..
            }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Category not found");
            }
            other => panic!("Expected Client error, got {:?}", other),
        }
        assert_eq!(transport.count("/categories/"), 1);
    }

    #[tokio::test]
    async fn test_client_error_without_message_uses_generic_text() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_raw("/categories/", 422, "<html>nope</html>");

        let error = executor(&transport)
            .execute("/categories/", RequestOptions::get())
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "HTTP error! status: 422");
    }

    #[tokio::test]
    async fn test_malformed_success_body_becomes_sentinel() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_raw("/messages/", 200, "not json at all");

        let result = executor(&transport)
            .execute("/messages/", RequestOptions::get())
            .await
            .unwrap();

        assert_eq!(result, json!({ "message": INVALID_JSON_MESSAGE }));
    }

    #[tokio::test]
    async fn test_content_type_depends_on_body_kind() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("/products/", 201, json!({ "id": 7 }));
        transport.respond("/products/7/image/", 201, json!({ "ok": true }));

        let executor = executor(&transport);
        executor
            .execute(
                "/products/",
                RequestOptions::post_json(json!({ "name": "Blue mug" })).bearer("abc"),
            )
            .await
            .unwrap();
        executor
            .execute(
                "/products/7/image/",
                RequestOptions::default()
                    .with_method(Method::POST)
                    .with_body(RequestBody::Multipart(
                        MultipartBody::new().file("image", "mug.png", None, vec![1, 2, 3]),
                    ))
                    .header("content-type", "application/json"),
            )
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(
            requests[0].headers.get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(requests[0].headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
        assert_eq!(requests[0].url, "http://backend.test/api/products/");
        assert!(requests[1].headers.get(CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn test_no_retry_policy_makes_single_attempt() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("/products/", 500, json!({}));

        let mut config = test_config();
        config.retry = RetryPolicy::no_retry();
        let executor = RequestExecutor::with_transport(config, transport.clone());

        assert!(executor
            .execute("/products/", RequestOptions::get())
            .await
            .is_err());
        assert_eq!(transport.count("/products/"), 1);
    }
}

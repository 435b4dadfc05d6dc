//! HTTP transport seam
//!
//! The request executor talks to the network only through [`HttpTransport`],
//! so retry and classification logic stays independent of the HTTP client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Method;
use tracing::debug;
use tradelink_core::{ApiConfig, ErrorContext, TradelinkError, TradelinkResult};

/// One file or text field of a multipart upload
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

/// Replayable description of a multipart form
///
/// `reqwest::multipart::Form` is consumed by sending, so the executor keeps
/// this description and rebuilds the form for every attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartBody {
    parts: Vec<MultipartPart>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<&str>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(MultipartPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: mime.map(str::to_string),
            bytes,
        });
        self
    }

    pub fn parts(&self) -> &[MultipartPart] {
        &self.parts
    }

    /// Build a fresh `reqwest` form from the description
    pub fn to_form(&self) -> TradelinkResult<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();

        for part in &self.parts {
            form = match part {
                MultipartPart::Text { name, value } => form.text(name.clone(), value.clone()),
                MultipartPart::File {
                    name,
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut file_part =
                        reqwest::multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        file_part =
                            file_part
                                .mime_str(mime)
                                .map_err(|e| TradelinkError::Internal {
                                    message: format!("Invalid MIME type '{}': {}", mime, e),
                                    context: ErrorContext::new("multipart")
                                        .with_operation("to_form")
                                        .with_metadata("part", name),
                                })?;
                    }
                    form.part(name.clone(), file_part)
                }
            };
        }

        Ok(form)
    }
}

/// Request payload
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartBody),
}

impl RequestBody {
    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }
}

/// Fully resolved request handed to a transport
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// Raw response; the executor does the JSON parsing
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Network seam of the request executor
///
/// Implementations return [`TradelinkError::Network`] when no HTTP status was
/// received; any received status, successful or not, is an `Ok` response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> TradelinkResult<HttpResponse>;
}

/// Production transport backed by `reqwest`
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with timeout and user agent from the API config
    pub fn new(config: &ApiConfig) -> TradelinkResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).map_err(|e| TradelinkError::Config {
                message: format!("Invalid user agent: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("http_client").with_operation("create_client"),
            })?,
        );

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()
            .map_err(|e| TradelinkError::Config {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("http_client").with_operation("create_client"),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> TradelinkResult<HttpResponse> {
        debug!(method = %request.method, url = %request.url, "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(serde_json::to_vec(&value)?),
            RequestBody::Multipart(body) => builder.multipart(body.to_form()?),
        };

        let response = builder.send().await.map_err(|e| TradelinkError::Network {
            message: format!("Request to {} failed: {}", request.url, e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_transport")
                .with_operation("send")
                .with_suggestion("Check network connectivity and API status"),
        })?;

        let status = response.status().as_u16();
        // A body that cannot be read is treated like an unparsable one
        let body = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();

        Ok(HttpResponse { status, body })
    }
}

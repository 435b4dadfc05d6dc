//! Scripted collaborators shared by the unit tests

use crate::navigator::Navigator;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::{Duration, Instant};
use tradelink_core::{ClientConfig, ErrorContext, RedirectTarget, TradelinkError, TradelinkResult};

pub(crate) fn test_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.api.base_url = "http://backend.test/api".to_string();
    config
}

enum Scripted {
    Respond(u16, Vec<u8>),
    Fail,
}

pub(crate) struct RecordedRequest {
    pub url: String,
    pub headers: reqwest::header::HeaderMap,
    pub at: Instant,
}

/// Transport answering from per-endpoint queues of canned responses
pub(crate) struct ScriptedTransport {
    routes: Mutex<Vec<(String, VecDeque<Scripted>)>>,
    requests: Mutex<Vec<RecordedRequest>>,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn push(&self, path: &str, scripted: Scripted) {
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|(route, _)| route == path) {
            Some((_, queue)) => queue.push_back(scripted),
            None => routes.push((path.to_string(), VecDeque::from([scripted]))),
        }
    }

    pub fn respond(&self, path: &str, status: u16, body: Value) {
        self.push(path, Scripted::Respond(status, body.to_string().into_bytes()));
    }

    pub fn respond_raw(&self, path: &str, status: u16, body: &str) {
        self.push(path, Scripted::Respond(status, body.as_bytes().to_vec()));
    }

    pub fn fail(&self, path: &str) {
        self.push(path, Scripted::Fail);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| RecordedRequest {
                url: r.url.clone(),
                headers: r.headers.clone(),
                at: r.at,
            })
            .collect()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.ends_with(path))
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }

    /// Whole milliseconds between consecutive requests to one endpoint
    pub fn gaps_ms(&self, path: &str) -> Vec<u64> {
        let times: Vec<Instant> = self.requests_to(path).iter().map(|r| r.at).collect();
        times
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis() as u64)
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> TradelinkResult<HttpResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: request.url.clone(),
            headers: request.headers.clone(),
            at: Instant::now(),
        });

        let next = {
            let mut routes = self.routes.lock().unwrap();
            routes
                .iter_mut()
                .find(|(route, _)| request.url.ends_with(route.as_str()))
                .and_then(|(_, queue)| queue.pop_front())
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match next {
            Some(Scripted::Respond(status, body)) => Ok(HttpResponse { status, body }),
            Some(Scripted::Fail) => Err(TradelinkError::Network {
                message: "connection reset".to_string(),
                source: None,
                context: ErrorContext::new("scripted_transport"),
            }),
            None => Ok(HttpResponse {
                status: 404,
                body: br#"{"message":"no scripted response"}"#.to_vec(),
            }),
        }
    }
}

/// Navigator that remembers every redirect
#[derive(Default)]
pub(crate) struct RecordingNavigator {
    redirects: Mutex<Vec<(RedirectTarget, String)>>,
}

impl RecordingNavigator {
    pub fn redirects(&self) -> Vec<(RedirectTarget, String)> {
        self.redirects.lock().unwrap().clone()
    }

    pub fn count(&self, target: RedirectTarget) -> usize {
        self.redirects()
            .iter()
            .filter(|(recorded, _)| *recorded == target)
            .count()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: RedirectTarget, route: &str) {
        self.redirects
            .lock()
            .unwrap()
            .push((target, route.to_string()));
    }
}

//! Transport capability: how a probe reaches the target.

use crate::types::{HttpConfig, Method, Probe, Response, Result, ScanError};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Sends one probe and returns the raw response.
///
/// Timeouts belong to the implementation, nothing above it imposes one.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, probe: &Probe) -> Result<Response>;
}

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// reqwest backed transport with optional throttling.
pub struct HttpTransport {
    client: Client,
    rate_limiter: Option<Arc<DirectLimiter>>,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|e| ScanError::ConfigError(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|e| ScanError::ConfigError(format!("header {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .danger_accept_invalid_certs(config.insecure)
            .redirect(reqwest::redirect::Policy::limited(10))
            .http1_only()
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        let rate_limiter = NonZeroU32::new(config.rate_limit)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));

        Ok(Self {
            client,
            rate_limiter,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, probe: &Probe) -> Result<Response> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.until_ready().await;
        }

        let request = match probe.method {
            Method::Get => self.client.get(&probe.url).query(&probe.params),
            Method::Post => self.client.post(&probe.url).form(&probe.params),
        };

        trace!("[{}] {} {}", probe.token, probe.method, probe.url);
        let response = request.send().await?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let debug_token = response
            .headers()
            .get("x-debug-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        debug!("[{}] {}", status, url);

        Ok(Response {
            status,
            url,
            debug_token,
            body,
        })
    }
}

#[cfg(test)]
pub mod mock {
    //! In-memory transport for tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves canned responses keyed by the probe's full URL (query included).
    #[derive(Default)]
    pub struct MockTransport {
        routes: HashMap<String, Response>,
        failures: Vec<String>,
        panics: Vec<String>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn route(mut self, url: &str, status: u16, body: &str) -> Self {
            self.routes.insert(
                url.to_string(),
                Response {
                    status,
                    url: url.to_string(),
                    debug_token: None,
                    body: body.to_string(),
                },
            );
            self
        }

        pub fn route_with_token(mut self, url: &str, status: u16, body: &str, token: &str) -> Self {
            self.routes.insert(
                url.to_string(),
                Response {
                    status,
                    url: url.to_string(),
                    debug_token: Some(token.to_string()),
                    body: body.to_string(),
                },
            );
            self
        }

        pub fn fail(mut self, url: &str) -> Self {
            self.failures.push(url.to_string());
            self
        }

        pub fn panic_on(mut self, url: &str) -> Self {
            self.panics.push(url.to_string());
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn seen(&self) -> Vec<String> {
            self.seen.lock().map(|s| s.clone()).unwrap_or_default()
        }

        pub fn full_url(probe: &Probe) -> String {
            if probe.params.is_empty() {
                return probe.url.clone();
            }
            let query: Vec<String> = probe
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            format!("{}?{}", probe.url, query.join("&"))
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, probe: &Probe) -> Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let url = Self::full_url(probe);
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(url.clone());
            }
            if self.panics.contains(&url) {
                panic!("mock transport panic for {}", url);
            }
            if self.failures.contains(&url) {
                return Err(ScanError::Transport(format!("connection refused: {}", url)));
            }

            Ok(self.routes.get(&url).cloned().unwrap_or(Response {
                status: 404,
                url,
                debug_token: None,
                body: String::new(),
            }))
        }
    }
}

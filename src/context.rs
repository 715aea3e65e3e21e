//! State shared by the discovery modules during one scan.

use crate::layout::Layout;
use crate::transport::Transport;
use crate::types::{Credential, Probe, RequestRecord, Response, Result};
use crate::version::Version;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info_span, Span};

/// Everything learned about the target so far.
///
/// Created once per scan and owned by the control task: modules mutate it
/// between two pool drains, workers never touch it.
pub struct ScanContext {
    /// Target base URL, without trailing slash.
    pub url: String,
    transport: Arc<dyn Transport>,
    /// Advertised framework version; gates which modules may run.
    pub version: Version,
    pub environment: String,
    pub info: BTreeMap<String, String>,
    /// Discovered artifacts: project path to content.
    pub files: BTreeMap<String, String>,
    /// Route name to path.
    pub routes: BTreeMap<String, String>,
    pub credentials: Vec<Credential>,
    /// Variables loaded from the project's dotenv files.
    pub env_vars: BTreeMap<String, String>,
    /// Direct requests issued against the target.
    pub requests: Vec<RequestRecord>,
    span: Span,
}

impl ScanContext {
    pub fn new(url: &str, transport: Arc<dyn Transport>) -> Self {
        let url = url.trim_end_matches('/').to_string();
        let span = info_span!("scan", target = %url);
        Self {
            url,
            transport,
            version: Version::unknown(),
            environment: "dev".to_string(),
            info: BTreeMap::new(),
            files: BTreeMap::new(),
            routes: BTreeMap::new(),
            credentials: Vec::new(),
            env_vars: BTreeMap::new(),
            requests: Vec::new(),
            span,
        }
    }

    /// Logging handle of this scan.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.version, &self.environment)
    }

    /// Absolute URL of a path on the target.
    pub fn target_url(&self, path: &str) -> String {
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }

    /// Send one probe right away, outside the worker pool, and log it.
    pub async fn send(&mut self, probe: Probe) -> Result<Response> {
        let response = self.transport.send(&probe).await?;
        self.requests.push(RequestRecord {
            method: probe.method,
            url: response.url.clone(),
            status: response.status,
            debug_token: response.debug_token.clone(),
        });
        Ok(response)
    }

    /// GET a path on the target.
    pub async fn get(&mut self, path: &str) -> Result<Response> {
        let probe = Probe::get(self.target_url(path));
        self.send(probe).await
    }

    /// Debug tokens generated by our direct requests.
    pub fn tokens(&self) -> Vec<String> {
        self.requests
            .iter()
            .filter_map(|r| r.debug_token.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[tokio::test]
    async fn test_get_records_request() {
        let transport = MockTransport::new().route_with_token("http://t/", 200, "home", "a1b2c3");
        let mut ctx = ScanContext::new("http://t/", Arc::new(transport));

        let response = ctx.get("/").await.unwrap();
        assert_eq!(response.body, "home");
        ctx.get("missing").await.unwrap();

        assert_eq!(ctx.requests.len(), 2);
        assert_eq!(ctx.requests[1].status, 404);
        assert_eq!(ctx.tokens(), vec!["a1b2c3".to_string()]);
    }

    #[test]
    fn test_layout_follows_version() {
        let mut ctx = ScanContext::new("http://t", Arc::new(MockTransport::new()));
        ctx.version = Version::parse("3.4.1");
        ctx.environment = "prod".to_string();
        assert_eq!(ctx.layout().cache, "var/cache/prod");
        assert_eq!(ctx.target_url("/a/b"), "http://t/a/b");
    }
}

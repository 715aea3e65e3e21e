//! Registered routes, listed by the router panel of a 404 request.
//!
//! When no route matches a request, the routing panel shows every route the
//! router compared it against, that is all of them.

use crate::context::ScanContext;
use crate::engine::WorkerPool;
use crate::modules::Module;
use crate::parser::PanelParser;
use crate::profiler;
use crate::types::Result;
use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, error, info, warn};

pub const NAME: &str = "Routes";

/// Builtin route prefixes left out of the report.
const IGNORED: &[&str] = &["/_profiler", "/_error", "/_wdt"];

pub struct Routes {
    ignore: Vec<String>,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            ignore: IGNORED.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Routes {
    /// Routes whose path doesn't start with an ignored prefix.
    pub fn filter(&self, routes: Vec<(String, String)>) -> Vec<(String, String)> {
        routes
            .into_iter()
            .filter(|(_, path)| !self.ignore.iter().any(|p| path.starts_with(p.as_str())))
            .collect()
    }
}

#[async_trait]
impl Module for Routes {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&self, ctx: &mut ScanContext, _pool: &WorkerPool) -> Result<()> {
        debug!("Triggering a 404 error");
        let response = ctx.get(&unmatchable_path()).await?;
        if response.status != 404 {
            error!("Target responded with status code {}!", response.status);
            return Ok(());
        }
        let Some(token) = response.debug_token else {
            error!("No debug token on the 404 response");
            return Ok(());
        };

        let panel = profiler::get(ctx, &token, &[("panel", "router")]).await?;
        let Some(router) = PanelParser::new().router(&panel.body) else {
            error!("Could not read the router panel of {}", token);
            return Ok(());
        };

        if let Some(ref route) = router.matched {
            warn!("Route matched: {}", route);
        }

        let routes = self.filter(router.routes);
        if routes.is_empty() {
            info!("Did not find any route");
            return Ok(());
        }

        warn!("Found the following routes:");
        for (name, path) in routes {
            warn!("  {}", path);
            ctx.routes.insert(name, path);
        }

        Ok(())
    }
}

/// `a/b/c/...`: twelve random one-letter segments, so even parameterised
/// routes can't match it.
fn unmatchable_path() -> String {
    let mut rng = rand::thread_rng();
    (0..12)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::transport::Transport;
    use crate::types::{Probe, Response};
    use std::sync::Arc;

    const ROUTER_PANEL: &str = r#"
        <span class="value">(none)</span><span class="label">Matched route</span>
        <table id="router-logs"><tbody>
            <tr><td>1</td><td>_wdt</td><td>/_wdt/{token}</td><td>-</td></tr>
            <tr><td>2</td><td>_profiler_home</td><td>/_profiler/</td><td>-</td></tr>
            <tr><td>3</td><td>admin_index</td><td>/{_locale}/admin/post/</td><td>-</td></tr>
            <tr><td>4</td><td>security_login</td><td>/{_locale}/login</td><td>-</td></tr>
        </tbody></table>"#;

    /// Answers any random path with a 404 carrying a debug token.
    struct NotFoundTarget;

    #[async_trait]
    impl Transport for NotFoundTarget {
        async fn send(&self, probe: &Probe) -> Result<Response> {
            let (status, token, body) = if probe.url == "http://t/_profiler/tok404" {
                (200, None, ROUTER_PANEL.to_string())
            } else {
                (404, Some("tok404".to_string()), String::new())
            };
            Ok(Response {
                status,
                url: probe.url.clone(),
                debug_token: token,
                body,
            })
        }
    }

    #[tokio::test]
    async fn test_routes_extracted_without_builtins() {
        let transport: Arc<dyn Transport> = Arc::new(NotFoundTarget);
        let mut ctx = ScanContext::new("http://t", transport.clone());
        let pool = WorkerPool::new(transport);

        Routes::default().run(&mut ctx, &pool).await.unwrap();

        assert_eq!(ctx.routes.len(), 2);
        assert_eq!(ctx.routes["admin_index"], "/{_locale}/admin/post/");
        assert_eq!(ctx.routes["security_login"], "/{_locale}/login");
        assert_eq!(ctx.tokens(), vec!["tok404".to_string()]);
    }

    #[test]
    fn test_unmatchable_path_shape() {
        let path = unmatchable_path();
        let segments: Vec<&str> = path.split('/').collect();
        assert_eq!(segments.len(), 12);
        assert!(segments
            .iter()
            .all(|s| s.len() == 1 && s.chars().all(|c| c.is_ascii_lowercase())));
    }
}

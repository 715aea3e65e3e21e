//! Application secrets exposed by phpinfo().

use crate::context::ScanContext;
use crate::engine::WorkerPool;
use crate::modules::Module;
use crate::parser::PanelParser;
use crate::profiler;
use crate::types::Result;
use async_trait::async_trait;
use tracing::{error, info, warn};

pub const NAME: &str = "Phpinfo";

/// Server variable listing the names loaded from the project's dotenv files.
const DOTENV_VARS: &str = "SYMFONY_DOTENV_VARS";

/// Reads `_profiler/phpinfo` and reports the variables loaded from dotenv.
pub struct Phpinfo;

#[async_trait]
impl Module for Phpinfo {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&self, ctx: &mut ScanContext, _pool: &WorkerPool) -> Result<()> {
        let response = profiler::get(ctx, "phpinfo", &[]).await?;
        if response.status == 404 {
            error!("Could not find phpinfo!");
            return Ok(());
        }
        info!("Available at {}", response.url);

        let Some(variables) = PanelParser::new().php_variables(&response.body) else {
            error!("Could not find PHP variables");
            return Ok(());
        };
        info!("Found {} PHP variables", variables.len());

        let names = variables
            .get(&env_key(DOTENV_VARS))
            .or_else(|| variables.get(&server_key(DOTENV_VARS)))
            .filter(|names| !names.trim().is_empty());
        let Some(names) = names else {
            info!("Did not find any Symfony variable");
            return Ok(());
        };

        warn!("Found the following Symfony variables:");
        for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let value = variables
                .get(&env_key(name))
                .or_else(|| variables.get(&server_key(name)))
                .cloned()
                .unwrap_or_default();
            warn!("  {}: {}", name, value);
            ctx.env_vars.insert(name.to_string(), value);
        }

        Ok(())
    }
}

fn env_key(name: &str) -> String {
    format!("$_ENV['{}']", name)
}

fn server_key(name: &str) -> String {
    format!("$_SERVER['{}']", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use std::sync::Arc;

    const PHPINFO: &str = r#"<h2>PHP Variables</h2>
        <table>
        <tr class="h"><th>Variable</th><th>Value</th></tr>
        <tr><td class="e">$_SERVER['APP_SECRET']</td><td class="v">67d829bf61dc5f87a73fd814e2c9f629</td></tr>
        <tr><td class="e">$_ENV['APP_ENV']</td><td class="v">dev</td></tr>
        <tr><td class="e">$_ENV['DATABASE_URL']</td><td class="v">mysql://root:root@db/app</td></tr>
        <tr><td class="e">$_ENV['SYMFONY_DOTENV_VARS']</td><td class="v">APP_ENV,APP_SECRET,DATABASE_URL</td></tr>
        </table>"#;

    #[tokio::test]
    async fn test_dotenv_variables_extracted() {
        let transport = Arc::new(MockTransport::new().route("http://t/_profiler/phpinfo", 200, PHPINFO));
        let mut ctx = ScanContext::new("http://t", transport.clone());
        let pool = WorkerPool::new(transport);

        Phpinfo.run(&mut ctx, &pool).await.unwrap();

        assert_eq!(ctx.env_vars.len(), 3);
        assert_eq!(ctx.env_vars["APP_SECRET"], "67d829bf61dc5f87a73fd814e2c9f629");
        assert_eq!(ctx.env_vars["DATABASE_URL"], "mysql://root:root@db/app");
    }

    #[tokio::test]
    async fn test_missing_phpinfo_is_not_an_error() {
        let transport = Arc::new(MockTransport::new());
        let mut ctx = ScanContext::new("http://t", transport.clone());
        let pool = WorkerPool::new(transport);

        Phpinfo.run(&mut ctx, &pool).await.unwrap();
        assert!(ctx.env_vars.is_empty());
    }
}

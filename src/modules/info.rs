//! Framework, PHP and environment details from the config panel.

use crate::context::ScanContext;
use crate::engine::WorkerPool;
use crate::modules::Module;
use crate::parser::PanelParser;
use crate::profiler;
use crate::types::Result;
use crate::version::Version;
use async_trait::async_trait;
use tracing::warn;

pub const NAME: &str = "Info";

/// Reads `_profiler/latest?panel=config`.
pub struct Info;

#[async_trait]
impl Module for Info {
    fn name(&self) -> &'static str {
        NAME
    }

    fn priority(&self) -> u32 {
        50
    }

    async fn run(&self, ctx: &mut ScanContext, _pool: &WorkerPool) -> Result<()> {
        let response = profiler::get(ctx, "latest", &[("panel", "config")]).await?;
        let parser = PanelParser::new();

        match framework_version(&parser, &response.body) {
            Some(version) => {
                warn!("  Symfony {}", version);
                ctx.version = version;
            }
            None => warn!("Could not identify Symfony version"),
        }

        match parser.metric(&response.body, "PHP version") {
            Some(php) => {
                let php = php.replace(' ', "");
                warn!("  PHP {}", php);
                ctx.info.insert("php_version".to_string(), php);
            }
            None => warn!("Could not identify PHP version"),
        }

        match parser.metric(&response.body, "Environment") {
            Some(environment) => {
                warn!("  Environment: {}", environment);
                ctx.environment = environment;
            }
            None => warn!("Could not identify Symfony environment"),
        }

        Ok(())
    }
}

/// "Symfony version" metric of a config panel.
pub fn framework_version(parser: &PanelParser, html: &str) -> Option<Version> {
    let raw = parser.metric(html, "Symfony version")?;
    let version = Version::parse(raw.replace("Symfony", "").trim());
    version.is_known().then_some(version)
}

//! Application source code, rebuilt from the classes the kernel knows about.
//!
//! The container dump lists every service class. Each class maps to one file
//! under the source root, and each previewed file names more classes in its
//! `use` statements, so the lookup runs until no new file shows up.

use crate::context::ScanContext;
use crate::engine::{FixpointDiscovery, WorkerPool};
use crate::modules::Module;
use crate::parser::{class_to_path, KernelParser};
use crate::profiler;
use crate::types::Result;
use crate::version::Version;
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

pub const NAME: &str = "Project sources";

pub struct Sources;

#[async_trait]
impl Module for Sources {
    fn name(&self) -> &'static str {
        NAME
    }

    fn min_version(&self) -> Version {
        Version::parse("3.0.0")
    }

    async fn run(&self, ctx: &mut ScanContext, pool: &WorkerPool) -> Result<()> {
        let layout = ctx.layout();
        let container_path = layout.kernel_container_cache.clone();

        debug!("Looking for Kernel cache container file at {}", container_path);
        let Some(container) = profiler::open(ctx, &container_path).await? else {
            error!("Could not find Kernel cache container file at {}", container_path);
            return Ok(());
        };

        let parser = KernelParser::new(&layout.namespace)?;
        let root = layout.root.as_str();

        let mut seed: BTreeSet<String> = parser
            .container_classes(&container)
            .iter()
            .map(|class| class_to_path(class, root))
            .collect();
        ctx.files.insert(container_path, container);

        for content in ctx.files.values() {
            seed.extend(
                parser
                    .references(content)
                    .iter()
                    .map(|class| class_to_path(class, root)),
            );
        }
        debug!("Found {} potential files", seed.len());

        let base = ctx.url.clone();
        let discovery = FixpointDiscovery::new(
            |path: &String| profiler::open_probe(&base, path),
            profiler::preview,
            |content: &String| {
                parser
                    .references(content)
                    .into_iter()
                    .map(|class| class_to_path(&class, root))
                    .collect::<Vec<_>>()
            },
        )
        .run(pool, seed)
        .await;

        debug!(
            "Probed {} files in {} rounds",
            discovery.known.len(),
            discovery.rounds
        );

        if discovery.discovered.is_empty() {
            info!("Did not find any file");
            return Ok(());
        }

        warn!("Found the following source files:");
        for (path, content) in discovery.discovered {
            warn!("  {}", path);
            ctx.files.insert(path, content);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use std::sync::Arc;

    const CONTAINER: &str = r#"<container>
  <services>
    <service id="kernel" class="App\Kernel" public="true" synthetic="true"/>
    <service id="App\Controller\BlogController" class="App\Controller\BlogController">
      <argument type="service" id="App\Repository\PostRepository"/>
      <argument type="service" id="doctrine.orm.default_entity_manager"/>
    </service>
  </services>
</container>"#;

    fn open_url(path: &str) -> String {
        format!("http://t/_profiler/open?file={}&line=1", path)
    }

    /// Preview page of a file, escaped like the profiler renders it.
    fn code(source: &str) -> String {
        source
            .lines()
            .map(|l| {
                let escaped = l
                    .replace('&', "&amp;")
                    .replace('<', "&lt;")
                    .replace('>', "&gt;")
                    .replace('"', "&quot;");
                format!("<code>{}</code>", escaped)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_sources_follow_references() {
        let container_path = "var/cache/dev/App_KernelDevDebugContainer.xml";
        let transport = Arc::new(
            MockTransport::new()
                .route(&open_url(container_path), 200, &code(CONTAINER))
                .route(&open_url("src/Kernel.php"), 200, &code("namespace App;"))
                .route(
                    &open_url("src/Controller/BlogController.php"),
                    200,
                    &code("use App\\Entity\\Post;\nuse App\\Repository\\PostRepository;"),
                )
                .route(
                    &open_url("src/Repository/PostRepository.php"),
                    200,
                    &code("use App\\Entity\\Post;"),
                )
                .route(
                    &open_url("src/Entity/Post.php"),
                    200,
                    &code("use App\\Entity\\Comment;"),
                ),
        );
        let mut ctx = ScanContext::new("http://t", transport.clone());
        ctx.version = Version::parse("5.4.0");
        let mut pool = WorkerPool::new(transport.clone());
        pool.start(4);

        Sources.run(&mut ctx, &pool).await.unwrap();
        pool.stop().await;

        let files: Vec<&str> = ctx.files.keys().map(String::as_str).collect();
        assert_eq!(
            files,
            vec![
                "src/Controller/BlogController.php",
                "src/Entity/Post.php",
                "src/Kernel.php",
                "src/Repository/PostRepository.php",
                container_path,
            ]
        );
        // Container, 3 seeds, Post, then the missing Comment once.
        assert_eq!(transport.calls(), 6);
    }

    #[tokio::test]
    async fn test_missing_container() {
        let transport = Arc::new(MockTransport::new());
        let mut ctx = ScanContext::new("http://t", transport.clone());
        ctx.version = Version::parse("4.4.0");
        let pool = WorkerPool::new(transport.clone());

        Sources.run(&mut ctx, &pool).await.unwrap();

        assert!(ctx.files.is_empty());
        assert_eq!(
            transport.seen(),
            vec![open_url("var/cache/dev/srcApp_KernelDevDebugContainer.xml")]
        );
    }
}

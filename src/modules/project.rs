//! Interesting project files, fuzzed through the profiler's file preview.

use crate::context::ScanContext;
use crate::engine::WorkerPool;
use crate::modules::Module;
use crate::profiler;
use crate::types::{Result, ScanError, Token};
use crate::version::Version;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const NAME: &str = "Project files";

const DEFAULT_WORDLIST: &str = include_str!("wordlist.txt");

const SECURITY_URL: &str = "https://security.symfony.com";

pub struct ProjectFiles {
    /// Custom wordlist, one project path per line.
    wordlist: Option<PathBuf>,
}

impl ProjectFiles {
    pub fn new(wordlist: Option<PathBuf>) -> Self {
        Self { wordlist }
    }

    /// Paths to look for, blank lines and `#` comments skipped.
    pub fn paths(&self) -> Result<Vec<String>> {
        let raw = match self.wordlist {
            Some(ref path) => std::fs::read_to_string(path).map_err(|e| {
                ScanError::ConfigError(format!("wordlist {}: {}", path.display(), e))
            })?,
            None => DEFAULT_WORDLIST.to_string(),
        };

        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(String::from)
            .collect())
    }
}

#[async_trait]
impl Module for ProjectFiles {
    fn name(&self) -> &'static str {
        NAME
    }

    fn min_version(&self) -> Version {
        Version::parse("3.0.0")
    }

    async fn run(&self, ctx: &mut ScanContext, pool: &WorkerPool) -> Result<()> {
        let paths = self.paths()?;
        match self.wordlist {
            Some(ref path) => debug!("Reading wordlist {}", path.display()),
            None => debug!("Using the embedded wordlist"),
        }

        let front = ctx.layout().front_controller;
        if profiler::open(ctx, &front).await?.is_none() {
            info!("The target does not support file preview");
            return Ok(());
        }

        let mut pending: HashMap<Token, String> = HashMap::with_capacity(paths.len());
        for path in paths {
            let probe = profiler::open_probe(&ctx.url, &path);
            pending.insert(probe.token.clone(), path);
            pool.submit(probe);
        }
        debug!("Enqueued {} entries", pending.len());
        pool.join().await;

        let mut found = BTreeMap::new();
        for result in pool.take_results() {
            let Some(path) = pending.remove(&result.token) else {
                continue;
            };
            if let Some(content) = profiler::preview(&result) {
                found.insert(path, content);
            }
        }

        if let Some(lock) = found.keys().find(|p| p.ends_with("composer.lock")) {
            info!(
                "Found: {}, run 'symfony security:check' or submit it at {}",
                lock, SECURITY_URL
            );
        }

        if found.is_empty() {
            warn!("Did not find any file");
            return Ok(());
        }

        warn!("Found the following files:");
        for (path, content) in found {
            warn!("  {}", path);
            ctx.files.insert(path, content);
        }

        Ok(())
    }
}

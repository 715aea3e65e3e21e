//! Scan orchestration: preflight, module sequencing and artifact output.

use crate::context::ScanContext;
use crate::engine::{WorkerPool, DEFAULT_HEARTBEAT};
use crate::modules::{info, Module};
use crate::parser::PanelParser;
use crate::profiler;
use crate::transport::{HttpTransport, Transport};
use crate::types::{ArtifactSummary, Credential, HttpConfig, Result, ScanError};
use crate::version::Version;
use futures::FutureExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// How one module ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModuleOutcome {
    Completed,
    /// Target version below the module's minimum.
    Skipped { required: Version },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: ModuleOutcome,
}

/// Runs discovery modules one after the other.
pub struct ScanOrchestrator {
    modules: Vec<Box<dyn Module>>,
}

impl ScanOrchestrator {
    /// Modules are ordered by ascending priority; equal priorities keep
    /// their registration order.
    pub fn new(mut modules: Vec<Box<dyn Module>>) -> Self {
        modules.sort_by_key(|m| m.priority());
        Self { modules }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Run every module against the context.
    ///
    /// A module whose minimum version is above the target's is skipped. A
    /// module failing, by error or panic, is logged and the next one runs.
    pub async fn run(&self, ctx: &mut ScanContext, pool: &WorkerPool) -> Vec<ModuleReport> {
        let mut reports = Vec::with_capacity(self.modules.len());

        for module in &self.modules {
            let name = module.name();
            let required = module.min_version();

            if ctx.version < required {
                info!(
                    "Skipping {}: requires version {}, target runs {}",
                    name, required, ctx.version
                );
                reports.push(ModuleReport {
                    name: name.to_string(),
                    outcome: ModuleOutcome::Skipped { required },
                });
                continue;
            }

            info!("{}", name);
            pool.clear();

            let span = info_span!(parent: ctx.span(), "module", name = name);
            let run = AssertUnwindSafe(module.run(ctx, pool).instrument(span))
                .catch_unwind()
                .await;

            let outcome = match run {
                Ok(Ok(())) => ModuleOutcome::Completed,
                Ok(Err(e)) => {
                    error!("{} failed: {}", name, e);
                    ModuleOutcome::Failed {
                        error: e.to_string(),
                    }
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("{} panicked: {}", name, message);
                    ModuleOutcome::Failed { error: message }
                }
            };
            reports.push(ModuleReport {
                name: name.to_string(),
                outcome,
            });
        }

        reports
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Everything a scan produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub target: String,
    pub version: Version,
    pub php_version: Option<String>,
    pub environment: String,
    pub modules: Vec<ModuleReport>,
    pub artifacts: Vec<ArtifactSummary>,
    pub routes: BTreeMap<String, String>,
    pub credentials: Vec<Credential>,
    pub env_vars: BTreeMap<String, String>,
    /// Debug tokens generated by our own requests.
    pub tokens: Vec<String>,
    /// Directory the artifacts were written to.
    pub output: Option<PathBuf>,
    pub duration_secs: f64,
}

/// Main scanner: checks the target, then runs the modules over a worker pool.
pub struct Scanner {
    transport: Arc<dyn Transport>,
    orchestrator: ScanOrchestrator,
    threads: usize,
    heartbeat: Duration,
    output: Option<PathBuf>,
}

impl Scanner {
    /// Scanner sending its requests over HTTP, running `modules`.
    pub fn new(http: &HttpConfig, modules: Vec<Box<dyn Module>>) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(http)?);
        Ok(Self::with_transport(transport).with_modules(modules))
    }

    /// Scanner with no module, over any transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            orchestrator: ScanOrchestrator::new(Vec::new()),
            threads: 10,
            heartbeat: DEFAULT_HEARTBEAT,
            output: None,
        }
    }

    pub fn with_modules(mut self, modules: Vec<Box<dyn Module>>) -> Self {
        self.orchestrator = ScanOrchestrator::new(modules);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Write artifacts below `dir` once the scan is over.
    pub fn with_output(mut self, dir: Option<PathBuf>) -> Self {
        self.output = dir;
        self
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Make sure the target runs in debug mode and read its version.
    ///
    /// Any failure here aborts the scan.
    pub async fn check(&self, ctx: &mut ScanContext) -> Result<()> {
        info!("Checks");

        let root = ctx
            .get("")
            .await
            .map_err(|e| ScanError::Fatal(format!("Target is unreachable: {}", e)))?;
        if root.debug_token.is_none() {
            return Err(ScanError::Fatal("Target is not in debug mode!".to_string()));
        }
        warn!("Target found in debug mode");

        let config = profiler::get(ctx, "latest", &[("panel", "config")])
            .await
            .map_err(|e| ScanError::Fatal(format!("Profiler is unreachable: {}", e)))?;
        match info::framework_version(&PanelParser::new(), &config.body) {
            Some(version) => {
                debug!("Target version {}", version);
                ctx.version = version;
            }
            None => warn!("Could not identify the target version, version gated modules will be skipped"),
        }

        Ok(())
    }

    /// Full scan of one target.
    pub async fn scan(&self, target: &str) -> Result<ScanReport> {
        let start = Instant::now();
        let mut ctx = ScanContext::new(target, self.transport.clone());
        info!("Starting scan on {}", ctx.url);

        self.check(&mut ctx).await?;

        let mut pool = WorkerPool::new(self.transport.clone()).with_heartbeat(self.heartbeat);
        pool.start(self.threads);
        let modules = self.orchestrator.run(&mut ctx, &pool).await;
        pool.stop().await;

        let output = match self.output {
            Some(ref dir) if !ctx.files.is_empty() => {
                info!("Saving files to {}", dir.display());
                save(dir, &ctx.files)?;
                info!("Saved {} files", ctx.files.len());
                Some(dir.clone())
            }
            _ => None,
        };

        let tokens = ctx.tokens();
        info!("Generated tokens: {}", tokens.join(" "));
        let duration = start.elapsed();
        info!("Scan completed in {:.2}s", duration.as_secs_f64());

        Ok(ScanReport {
            target: ctx.url,
            version: ctx.version,
            php_version: ctx.info.get("php_version").cloned(),
            environment: ctx.environment,
            modules,
            artifacts: summarize(&ctx.files),
            routes: ctx.routes,
            credentials: ctx.credentials,
            env_vars: ctx.env_vars,
            tokens,
            output,
            duration_secs: duration.as_secs_f64(),
        })
    }
}

/// Size and SHA-256 of every artifact.
pub fn summarize(files: &BTreeMap<String, String>) -> Vec<ArtifactSummary> {
    files
        .iter()
        .map(|(path, content)| ArtifactSummary {
            path: path.clone(),
            bytes: content.len(),
            sha256: hex::encode(Sha256::digest(content.as_bytes())),
        })
        .collect()
}

/// Where an artifact lands below `dir`.
///
/// The project path is normalised lexically first, so `..` can't climb out
/// of the output directory.
pub fn artifact_path(dir: &Path, path: &str) -> PathBuf {
    let mut relative = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::ParentDir => {
                relative.pop();
            }
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
        }
    }
    dir.join(relative)
}

/// Write every artifact below `dir`.
pub fn save(dir: &Path, files: &BTreeMap<String, String>) -> Result<()> {
    for (path, content) in files {
        let target = artifact_path(dir, path);
        if target == dir {
            warn!("Not saving {}: empty path", path);
            continue;
        }
        if let Some(parent) = target.parent() {
            create_dir(parent, 0o750)?;
        }
        std::fs::write(&target, content)?;
        debug!("Saved {}", target.display());
    }
    Ok(())
}

/// `mkdir -p` with the given mode on created directories.
pub fn create_dir(path: &Path, mode: u32) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path)?;
    Ok(())
}

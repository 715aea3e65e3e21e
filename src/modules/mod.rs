//! Discovery modules.
//!
//! Each module reads what earlier ones stored in the [`ScanContext`], issues
//! its own probes (directly or through the worker pool) and records what it
//! finds back into the context. Modules are listed explicitly in
//! [`registry`] and run by the orchestrator in ascending priority.

pub mod info;
pub mod logs;
pub mod phpinfo;
pub mod project;
pub mod routes;
pub mod sources;

use crate::context::ScanContext;
use crate::engine::WorkerPool;
use crate::types::Result;
use crate::version::Version;
use async_trait::async_trait;
use std::path::PathBuf;

pub use info::Info;
pub use logs::RequestLogs;
pub use phpinfo::Phpinfo;
pub use project::ProjectFiles;
pub use routes::Routes;
pub use sources::Sources;

/// Priority given to modules with no ordering needs.
pub const DEFAULT_PRIORITY: u32 = 100;

/// A discovery module.
#[async_trait]
pub trait Module: Send + Sync {
    /// Name displayed in logs before the module runs.
    fn name(&self) -> &'static str;

    /// Lower runs earlier.
    fn priority(&self) -> u32 {
        DEFAULT_PRIORITY
    }

    /// Minimum target version required to run.
    fn min_version(&self) -> Version {
        Version::unknown()
    }

    async fn run(&self, ctx: &mut ScanContext, pool: &WorkerPool) -> Result<()>;
}

/// Options handed to the modules that take any.
#[derive(Debug, Clone, Default)]
pub struct ModuleOptions {
    /// Project files wordlist, the embedded one when unset.
    pub wordlist: Option<PathBuf>,
}

/// Every available module, in registration order.
pub fn registry(options: &ModuleOptions) -> Vec<Box<dyn Module>> {
    vec![
        Box::new(Info),
        Box::new(RequestLogs::default()),
        Box::new(Phpinfo),
        Box::new(ProjectFiles::new(options.wordlist.clone())),
        Box::new(Routes::default()),
        Box::new(Sources),
    ]
}

/// Modules whose name is listed, in registration order.
pub fn select(options: &ModuleOptions, names: &[&str]) -> Vec<Box<dyn Module>> {
    registry(options)
        .into_iter()
        .filter(|m| names.contains(&m.name()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_are_unique() {
        let modules = registry(&ModuleOptions::default());
        let mut names: Vec<&str> = modules.iter().map(|m| m.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), modules.len());
    }

    #[test]
    fn test_select_keeps_registration_order() {
        let modules = select(
            &ModuleOptions::default(),
            &[sources::NAME, info::NAME],
        );
        let names: Vec<&str> = modules.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec![info::NAME, sources::NAME]);
    }

    #[test]
    fn test_info_runs_first() {
        let modules = registry(&ModuleOptions::default());
        let first = modules.iter().min_by_key(|m| m.priority()).unwrap();
        assert_eq!(first.name(), info::NAME);
    }
}

//! symprobe - Symfony web profiler prober.
//!
//! This library rebuilds what an exposed profiler leaks about an application:
//! - Framework, PHP and environment details
//! - Project files and source code, through the profiler's file preview
//! - Registered routes
//! - Credentials and sessions from the request logs
//! - Variables loaded from the project's dotenv files
//!
//! Probes are executed by a fixed pool of workers; source discovery grows its
//! own workload until a fixpoint is reached.
//!
//! # Example
//!
//! ```no_run
//! use symprobe::modules::{registry, ModuleOptions};
//! use symprobe::{HttpConfig, Scanner};
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = ModuleOptions::default();
//!     let scanner = Scanner::new(&HttpConfig::default(), registry(&options)).unwrap();
//!     let report = scanner.scan("http://localhost:8000").await.unwrap();
//!     println!("Found {} artifacts", report.artifacts.len());
//! }
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod layout;
pub mod modules;
pub mod notify;
pub mod parser;
pub mod profiler;
pub mod scanner;
pub mod transport;
pub mod types;
pub mod version;

pub use config::{Commands, Config, GetConfig, ScanConfig, TargetArgs};
pub use context::ScanContext;
pub use engine::{FixpointDiscovery, RequestQueue, WorkerPool};
pub use notify::ConsoleOutput;
pub use scanner::{ModuleOutcome, ModuleReport, ScanOrchestrator, ScanReport, Scanner};
pub use transport::{HttpTransport, Transport};
pub use types::{
    ArtifactSummary, Credential, HttpConfig, Probe, ProbeResult, Response, Result, ScanError,
};
pub use version::Version;

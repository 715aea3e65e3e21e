//! Concurrent probing engine.
//!
//! This module provides:
//! - A request queue with drain/heartbeat semantics
//! - A fixed-size worker pool executing probes through the transport
//! - A fixpoint discovery algorithm growing its own workload round by round

pub mod fixpoint;
pub mod pool;
pub mod queue;

pub use fixpoint::{Discovery, FixpointDiscovery};
pub use pool::{WorkerPool, DEFAULT_HEARTBEAT};
pub use queue::{Job, RequestQueue};

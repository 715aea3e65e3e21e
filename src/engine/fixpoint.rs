//! Iterative graph expansion over the worker pool.
//!
//! Starting from a seed set of ids, every round probes the frontier, keeps
//! the content of each successful probe and feeds the ids it references back
//! into the next frontier. The run stops once a round brings no new id.

use crate::engine::pool::WorkerPool;
use crate::types::{Probe, ProbeResult, Token};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Display;
use tracing::{debug, trace};

/// Everything a discovery run found.
#[derive(Debug, Clone)]
pub struct Discovery<I: Ord, C> {
    /// Content of every id that answered.
    pub discovered: BTreeMap<I, C>,
    /// Every id ever probed, answered or not.
    pub known: BTreeSet<I>,
    /// Number of probing rounds.
    pub rounds: usize,
}

/// Fixpoint discovery parameterised by its probe builder and extractors.
pub struct FixpointDiscovery<B, E, R> {
    build: B,
    extract: E,
    references: R,
}

impl<B, E, R> FixpointDiscovery<B, E, R> {
    /// * `build` turns an id into the probe fetching it.
    /// * `extract` returns the content carried by a result, `None` when the
    ///   id is absent (error, not found...).
    /// * `references` lists the ids referenced by a piece of content.
    pub fn new(build: B, extract: E, references: R) -> Self {
        Self {
            build,
            extract,
            references,
        }
    }

    /// Run to convergence.
    ///
    /// Absent ids are left out of `discovered` and never probed again; no
    /// retry is attempted.
    pub async fn run<I, C, S, Refs>(&self, pool: &WorkerPool, seed: S) -> Discovery<I, C>
    where
        I: Ord + Clone + Display,
        S: IntoIterator<Item = I>,
        B: Fn(&I) -> Probe,
        E: Fn(&ProbeResult) -> Option<C>,
        R: Fn(&C) -> Refs,
        Refs: IntoIterator<Item = I>,
    {
        let mut known: BTreeSet<I> = seed.into_iter().collect();
        let mut frontier: Vec<I> = known.iter().cloned().collect();
        let mut discovered = BTreeMap::new();
        let mut rounds = 0;

        while !frontier.is_empty() {
            rounds += 1;
            debug!("Round {}: probing {} ids", rounds, frontier.len());

            let mut pending: HashMap<Token, I> = HashMap::with_capacity(frontier.len());
            for id in frontier.drain(..) {
                let probe = (self.build)(&id);
                pending.insert(probe.token.clone(), id);
                pool.submit(probe);
            }

            pool.join().await;

            for result in pool.take_results() {
                let Some(id) = pending.remove(&result.token) else {
                    trace!("[{}] Result does not belong to this round", result.token);
                    continue;
                };
                let Some(content) = (self.extract)(&result) else {
                    trace!("{} is absent", id);
                    continue;
                };

                for reference in (self.references)(&content) {
                    if !known.contains(&reference) {
                        trace!("{} references {}", id, reference);
                        known.insert(reference.clone());
                        frontier.push(reference);
                    }
                }
                discovered.insert(id, content);
            }

            pool.clear();
        }

        Discovery {
            discovered,
            known,
            rounds,
        }
    }
}

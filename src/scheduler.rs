//! C5 — Batch Scheduler.
//!
//! Partitions a turn's tool calls into read batches (chunked per family by
//! speed tier, capped by `family_parallelism` and running concurrently
//! across families under an outer `tools.parallelism` semaphore) and a
//! serialized tail of writes, which run one at a time regardless of family
//! (§4.5). Call order in the flattened output always matches input order,
//! independent of which batch finished first.

use crate::config::RuntimeConfig;
use crate::executor::Executor;
use crate::model::{RunState, ToolCall, ToolResult};
use crate::tools::is_write_style;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct BatchScheduler {
    executor: Executor,
    config: Arc<RuntimeConfig>,
}

impl BatchScheduler {
    pub fn new(executor: Executor, config: Arc<RuntimeConfig>) -> Self {
        Self { executor, config }
    }

    /// Run every call in `calls`, preserving the caller's order in the
    /// returned `Vec`. Reads within a family run with bounded concurrency;
    /// writes are pulled out and run strictly one at a time, after reads
    /// (§4.5 step 2 — "extract writes, run individually").
    pub async fn run_batch(&self, calls: Vec<ToolCall>, run_state: &mut RunState) -> Vec<ToolResult> {
        let mut results: Vec<Option<ToolResult>> = (0..calls.len()).map(|_| None).collect();

        let mut reads = Vec::new();
        let mut writes = Vec::new();
        for (idx, call) in calls.into_iter().enumerate() {
            if is_write_style(&call.tool_name) {
                writes.push((idx, call));
            } else {
                reads.push((idx, call));
            }
        }

        if !reads.is_empty() {
            self.run_reads(reads, run_state, &mut results).await;
        }

        for (idx, call) in writes {
            let result = self.executor.execute(&call, run_state).await;
            results[idx] = Some(result);
        }

        results.into_iter().map(|r| r.expect("every call index must be filled")).collect()
    }

    /// Speed-tier batch-size cap (§4.5): fast family (tmdb, quick plex
    /// reads) up to 8; medium family (plex searches, radarr/sonarr reads) up
    /// to 4. The named slow-family cap of 2 (radarr/sonarr writes) never
    /// applies here — writes are always extracted in `run_batch` and run
    /// individually, one at a time, which trivially satisfies it.
    fn batch_cap(family: &str, tool_name: &str) -> usize {
        match family {
            "tmdb" => 8,
            "plex" if tool_name.contains("search") => 4,
            "plex" => 8,
            _ => 4,
        }
    }

    async fn run_reads(
        &self,
        reads: Vec<(usize, ToolCall)>,
        run_state: &mut RunState,
        results: &mut [Option<ToolResult>],
    ) {
        // Dedup against the run's existing cache up front, single-threaded,
        // before any concurrent work starts. Two calls in the *same* batch
        // can canonicalize to the same key before either has a result to
        // dedup against, so same-batch duplicates are set aside here and
        // resolved against the first call's outcome once every spawned task
        // below has completed (§8 invariant 3).
        let mut by_family: HashMap<String, Vec<(usize, ToolCall, String)>> = HashMap::new();
        let mut claimed: HashMap<String, usize> = HashMap::new();
        let mut duplicates: Vec<(usize, String)> = Vec::new();
        for (idx, call) in reads {
            let dedup_key = crate::cache::canonicalize_args(&call.tool_name, &call.arguments);
            if let Some(hit) = crate::cache::dedup_lookup(&run_state.dedup_cache, &dedup_key) {
                results[idx] = Some(hit);
                continue;
            }
            if claimed.contains_key(&dedup_key) {
                duplicates.push((idx, dedup_key));
                continue;
            }
            claimed.insert(dedup_key.clone(), idx);
            let family = crate::tools::classify_family(&call.tool_name).as_str().to_string();
            by_family.entry(family).or_default().push((idx, call, dedup_key));
        }

        // Outer semaphore (§4.5/§5): batches — one per chunk below — run
        // concurrently across every family, bounded by `tools.parallelism`.
        let outer = Arc::new(Semaphore::new(self.config.tools.parallelism.max(1)));

        let mut batch_handles = Vec::new();
        for (family, calls) in by_family {
            // Within a family, calls still run concurrently up to its own
            // parallelism cap, shared across all of that family's batches.
            let inner = Arc::new(Semaphore::new(self.config.family_parallelism(&family).max(1)));
            let cap = calls.iter().map(|(_, c, _)| Self::batch_cap(&family, &c.tool_name)).min().unwrap_or(4).max(1);
            for chunk in calls.chunks(cap) {
                let chunk = chunk.to_vec();
                let outer = outer.clone();
                let inner = inner.clone();
                let executor = self.executor.clone();
                batch_handles.push(tokio::spawn(async move {
                    let _batch_permit = outer.acquire_owned().await.expect("semaphore not closed");
                    let mut call_handles = Vec::new();
                    for (idx, call, dedup_key) in chunk {
                        let inner = inner.clone();
                        let executor = executor.clone();
                        call_handles.push(tokio::spawn(async move {
                            let _permit = inner.acquire_owned().await.expect("semaphore not closed");
                            let mut scratch = RunState::new(false);
                            let result = executor.execute(&call, &mut scratch).await;
                            (idx, dedup_key, result)
                        }));
                    }
                    let mut out = Vec::with_capacity(call_handles.len());
                    for handle in call_handles {
                        match handle.await {
                            Ok(triple) => out.push(triple),
                            Err(join_err) => log::error!("tool call task panicked: {join_err}"),
                        }
                    }
                    out
                }));
            }
        }

        let mut completed: HashMap<String, ToolResult> = HashMap::new();
        for handle in batch_handles {
            match handle.await {
                Ok(outcomes) => {
                    for (idx, dedup_key, result) in outcomes {
                        run_state.dedup_cache.insert(dedup_key.clone(), result.clone());
                        completed.insert(dedup_key, result.clone());
                        results[idx] = Some(result);
                    }
                }
                Err(join_err) => {
                    log::error!("tool batch task panicked: {join_err}");
                }
            }
        }

        for (idx, dedup_key) in duplicates {
            if let Some(hit) = crate::cache::dedup_lookup(&completed, &dedup_key) {
                results[idx] = Some(hit);
            }
        }
    }
}

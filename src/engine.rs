//! Multi-pass pairwise merge engine.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::error::RunError;
use crate::format::RunFormat;
use crate::merger;
use crate::registry::RunRegistry;
use crate::run::{Run, RunStore};

/// Merge engine.
///
/// Merges the runs of a registry pass by pass: every pass pairs adjacent runs `(0, 1), (2, 3), ...`,
/// merges each pair into a new run and registers the results in pair order. An odd run at the end
/// of a pass is carried over to the next one. Merging of *n* runs takes *ceil(log2(n))* passes.
///
/// Pairs of a pass are independent and merged concurrently on the provided thread pool, no more than
/// `concurrency` pairs at a time. Every concurrent merge holds two input and one output file open.
pub struct MergeEngine<'a, F> {
    store: &'a RunStore,
    thread_pool: &'a rayon::ThreadPool,
    concurrency: usize,
    compare: F,
    cancel: &'a CancelToken,
}

impl<'a, F> MergeEngine<'a, F> {
    /// Creates a new merge engine.
    ///
    /// # Arguments
    /// * `store` - Store merged runs are created in
    /// * `thread_pool` - Thread pool merges are run on
    /// * `concurrency` - Maximum number of pairs merged at the same time
    /// * `compare` - Function to be used to compare items
    /// * `cancel` - Cancellation token
    pub fn new(
        store: &'a RunStore,
        thread_pool: &'a rayon::ThreadPool,
        concurrency: usize,
        compare: F,
        cancel: &'a CancelToken,
    ) -> Self {
        MergeEngine {
            store,
            thread_pool,
            concurrency: concurrency.max(1),
            compare,
            cancel,
        }
    }

    /// Merges registered runs until no more than one run is left in the registry.
    /// Returns the number of passes made.
    pub fn merge_all<T, C>(&self, registry: &mut RunRegistry<T, C>) -> Result<usize, RunError>
    where
        C: RunFormat<T>,
        F: Fn(&T, &T) -> Ordering + Sync + Send + Copy,
    {
        let mut passes = 0;

        while registry.len() > 1 {
            passes += 1;
            let runs = registry.take();
            log::debug!("merge pass {} started ({} runs)", passes, runs.len());

            let mut runs = runs.into_iter();
            let mut pairs = Vec::with_capacity(runs.len() / 2 + 1);
            while let Some(left) = runs.next() {
                pairs.push((left, runs.next()));
            }

            registry.extend(self.merge_pairs(pairs)?);
            log::debug!("merge pass {} done ({} runs left)", passes, registry.len());
        }

        return Ok(passes);
    }

    fn merge_pairs<T, C>(&self, mut pairs: Vec<(Run<T, C>, Option<Run<T, C>>)>) -> Result<Vec<Run<T, C>>, RunError>
    where
        C: RunFormat<T>,
        F: Fn(&T, &T) -> Ordering + Sync + Send + Copy,
    {
        let mut merged = Vec::with_capacity(pairs.len());

        while !pairs.is_empty() {
            let batch_size = self.concurrency.min(pairs.len());
            let batch = Vec::from_iter(pairs.drain(..batch_size));

            let batch_merged: Result<Vec<Run<T, C>>, RunError> = self.thread_pool.install(|| {
                batch
                    .into_par_iter()
                    .map(|(left, right)| merger::merge_pair(self.store, left, right, self.compare, self.cancel))
                    .collect()
            });
            merged.extend(batch_merged?);
        }

        return Ok(merged);
    }
}

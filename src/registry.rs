//! Run registry.

use std::path::Path;

use crate::run::Run;

/// Ordered list of live runs of a single sort invocation.
///
/// Runs are kept in insertion order, which is the order they are paired in by the merge engine.
/// Dropping the registry removes all the runs it still holds.
pub struct RunRegistry<T, C> {
    runs: Vec<Run<T, C>>,
}

impl<T, C> RunRegistry<T, C> {
    pub fn new() -> Self {
        RunRegistry { runs: Vec::new() }
    }

    /// Appends a run to the end of the registry.
    pub fn push(&mut self, run: Run<T, C>) {
        log::trace!("registering run {} ({} records)", run.id().display(), run.len());
        self.runs.push(run);
    }

    /// Takes all the registered runs leaving the registry empty.
    pub fn take(&mut self) -> Vec<Run<T, C>> {
        std::mem::take(&mut self.runs)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Checks if exactly one run is registered.
    pub fn is_single(&self) -> bool {
        self.runs.len() == 1
    }

    /// Returns registered run identifiers in registry order.
    pub fn ids(&self) -> impl Iterator<Item = &Path> {
        self.runs.iter().map(Run::id)
    }

    /// Returns the total number of records in the registered runs.
    pub fn records(&self) -> u64 {
        self.runs.iter().map(Run::len).sum()
    }

    /// Returns the only registered run.
    /// If the registry holds no runs or more than one run [`None`] is returned and the runs are dropped.
    pub fn into_single(mut self) -> Option<Run<T, C>> {
        if self.is_single() {
            self.runs.pop()
        } else {
            None
        }
    }
}

impl<T, C> Default for RunRegistry<T, C> {
    fn default() -> Self {
        RunRegistry::new()
    }
}

impl<T, C> Extend<Run<T, C>> for RunRegistry<T, C> {
    fn extend<I: IntoIterator<Item = Run<T, C>>>(&mut self, runs: I) {
        for run in runs {
            self.push(run);
        }
    }
}

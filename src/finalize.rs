//! Sorting result.

use std::fmt;
use std::io::prelude::*;
use std::path::Path;

use crate::cancel::CancelToken;
use crate::error::{Phase, RunError};
use crate::format::RunFormat;
use crate::run::{Run, RunReader, RunStore};

/// Sorting statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortStats {
    /// Number of sorted records.
    pub records: u64,
    /// Number of runs generated from the input.
    pub runs: usize,
    /// Number of merge passes made.
    pub merge_passes: usize,
}

/// Sorted data produced by an external sorter.
///
/// Holds the last remaining run (none for an empty input) along with the storage of the sort invocation.
/// The data can be copied to an output with [`SortedRun::write_to`] or read record by record
/// through the [`Iterator`] implementation. Temporary data is removed once the run is consumed or
/// the value is dropped.
pub struct SortedRun<T, C> {
    run: Option<Run<T, C>>,
    reader: Option<RunReader<T, C>>,
    store: RunStore,
    cancel: CancelToken,
    stats: SortStats,
}

impl<T, C> SortedRun<T, C>
where
    C: RunFormat<T>,
{
    pub(crate) fn new(run: Option<Run<T, C>>, store: RunStore, cancel: CancelToken, stats: SortStats) -> Self {
        SortedRun {
            run,
            reader: None,
            store,
            cancel,
            stats,
        }
    }

    /// Returns sorting statistics.
    pub fn stats(&self) -> &SortStats {
        &self.stats
    }

    /// Returns the number of sorted records.
    pub fn len(&self) -> u64 {
        self.stats.records
    }

    pub fn is_empty(&self) -> bool {
        self.stats.records == 0
    }

    /// Returns the identifier of the sorted run if it is not consumed yet.
    pub fn id(&self) -> Option<&Path> {
        self.run.as_ref().map(Run::id)
    }

    /// Copies the sorted run to the output as is, in the run record format, then removes all temporary data.
    /// If some records were already read through the iterator only the rest of them is copied.
    /// Returns the number of sorted records.
    pub fn write_to<W: Write>(mut self, writer: &mut W) -> Result<u64, RunError> {
        if let Some(run) = self.run.take() {
            {
                let mut reader = match self.reader.take() {
                    Some(reader) => reader.into_inner(),
                    None => self
                        .store
                        .open_raw(&run)
                        .map_err(|err| RunError::read(Phase::Finalize, run.id(), err))?,
                };

                loop {
                    self.cancel.check(Phase::Finalize)?;

                    let buf = reader
                        .fill_buf()
                        .map_err(|err| RunError::read(Phase::Finalize, run.id(), err))?;
                    if buf.is_empty() {
                        break;
                    }

                    let len = buf.len();
                    writer.write_all(buf).map_err(RunError::Output)?;
                    reader.consume(len);
                }
            }

            let run_id = run.id().to_path_buf();
            run.delete()
                .map_err(|err| RunError::resource(Phase::Finalize, Some(&run_id), err))?;
        }

        writer.flush().map_err(RunError::Output)?;

        let records = self.stats.records;
        let store_path = self.store.path().to_path_buf();
        self.store
            .close()
            .map_err(|err| RunError::resource(Phase::Finalize, Some(&store_path), err))?;

        log::debug!("{} sorted records written", records);

        return Ok(records);
    }

    fn abort(&mut self, err: RunError) -> Option<Result<T, RunError>> {
        self.reader = None;
        self.run = None;
        Some(Err(err))
    }
}

impl<T, C> Iterator for SortedRun<T, C>
where
    C: RunFormat<T>,
{
    type Item = Result<T, RunError>;

    /// Returns the next sorted record. The run is deleted once all the records are read.
    fn next(&mut self) -> Option<Self::Item> {
        let run = self.run.as_ref()?;

        if let Err(err) = self.cancel.check(Phase::Finalize) {
            return self.abort(err);
        }

        if self.reader.is_none() {
            match self.store.open(run) {
                Ok(reader) => self.reader = Some(reader),
                Err(err) => {
                    let err = RunError::read(Phase::Finalize, run.id(), err);
                    return self.abort(err);
                }
            }
        }

        match self.reader.as_mut()?.next() {
            Some(Ok(item)) => Some(Ok(item)),
            Some(Err(err)) => {
                let err = RunError::read(Phase::Finalize, self.run.as_ref()?.id(), err);
                self.abort(err)
            }
            None => {
                self.reader = None;
                let run = self.run.take()?;
                let run_id = run.id().to_path_buf();
                match run.delete() {
                    Ok(()) => {
                        log::debug!("sorted run {} consumed", run_id.display());
                        None
                    }
                    Err(err) => Some(Err(RunError::resource(Phase::Finalize, Some(&run_id), err))),
                }
            }
        }
    }
}

impl<T, C> fmt::Debug for SortedRun<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortedRun")
            .field("run", &self.run)
            .field("store", &self.store.path())
            .field("stats", &self.stats)
            .finish()
    }
}

//! Sorted runs stored in temporary files.

use std::fmt;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::marker::PhantomData;
use std::path::Path;

use tempfile;

use crate::format::RunFormat;

/// Scoped storage area for the runs of a single sort invocation.
///
/// Every store owns a freshly created temporary directory, so stores never share run files
/// and everything left in the directory is removed when the store is dropped.
pub struct RunStore {
    /// Directory run files are created in.
    dir: tempfile::TempDir,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl RunStore {
    /// Creates a new store.
    ///
    /// # Arguments
    /// * `parent` - Directory the store directory is created in. If the parameter is [`None`] default OS temporary
    ///   directory will be used.
    /// * `rw_buf_size` - Run files read/write buffer size.
    pub fn new(parent: Option<&Path>, rw_buf_size: Option<usize>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ext-merge-sort-");

        let dir = if let Some(parent) = parent {
            builder.tempdir_in(parent)
        } else {
            builder.tempdir()
        }?;

        log::debug!("using {} as a run directory", dir.path().display());

        return Ok(RunStore { dir, rw_buf_size });
    }

    /// Returns the store directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Creates a new uniquely named run file and returns a writer to fill it.
    pub fn create<T, C: RunFormat<T>>(&self) -> io::Result<RunWriter<T, C>> {
        let tmp_file = tempfile::Builder::new()
            .prefix("run-")
            .suffix(".tmp")
            .tempfile_in(self.dir.path())?;

        let writer = match self.rw_buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, tmp_file.as_file().try_clone()?),
            None => io::BufWriter::new(tmp_file.as_file().try_clone()?),
        };

        return Ok(RunWriter {
            writer,
            path: tmp_file.into_temp_path(),
            len: 0,
            format: PhantomData,
        });
    }

    /// Opens a run for reading records.
    pub fn open<T, C: RunFormat<T>>(&self, run: &Run<T, C>) -> io::Result<RunReader<T, C>> {
        Ok(RunReader {
            reader: self.open_raw(run)?,
            format: PhantomData,
        })
    }

    /// Opens a run for reading its encoded bytes.
    pub fn open_raw<T, C>(&self, run: &Run<T, C>) -> io::Result<io::BufReader<fs::File>> {
        let file = fs::File::open(run.id())?;

        Ok(match self.rw_buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        })
    }

    /// Removes the store directory and everything left in it.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

/// Writer of a run being created.
/// If the writer is dropped before [`RunWriter::finish`] the run file is removed.
pub struct RunWriter<T, C> {
    writer: io::BufWriter<fs::File>,
    path: tempfile::TempPath,
    len: u64,

    format: PhantomData<fn() -> (T, C)>,
}

impl<T, C: RunFormat<T>> RunWriter<T, C> {
    /// Returns the identifier of the run being written.
    pub fn id(&self) -> &Path {
        &self.path
    }

    /// Appends a record to the run. Records must be pushed in sorted order.
    pub fn push(&mut self, item: &T) -> Result<(), C::SerializationError> {
        C::write_record(&mut self.writer, item)?;
        self.len += 1;

        return Ok(());
    }

    /// Flushes written data and seals the run.
    pub fn finish(mut self) -> io::Result<Run<T, C>> {
        self.writer.flush()?;

        return Ok(Run {
            path: self.path,
            len: self.len,
            format: PhantomData,
        });
    }
}

/// Sorted immutable run.
/// The run file is removed by [`Run::delete`] or when the run is dropped.
pub struct Run<T, C> {
    path: tempfile::TempPath,
    len: u64,

    format: PhantomData<fn() -> (T, C)>,
}

impl<T, C> Run<T, C> {
    /// Returns the run identifier, which is its file path.
    pub fn id(&self) -> &Path {
        &self.path
    }

    /// Returns the number of records in the run.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes the run file.
    pub fn delete(self) -> io::Result<()> {
        self.path.close()
    }
}

impl<T, C> fmt::Debug for Run<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Run")
            .field("id", &self.id())
            .field("len", &self.len)
            .finish()
    }
}

/// Run records iterator.
pub struct RunReader<T, C> {
    reader: io::BufReader<fs::File>,

    format: PhantomData<fn() -> (T, C)>,
}

impl<T, C> RunReader<T, C> {
    /// Returns the underlying reader positioned right after the last read record.
    pub fn into_inner(self) -> io::BufReader<fs::File> {
        self.reader
    }
}

impl<T, C: RunFormat<T>> Iterator for RunReader<T, C> {
    type Item = Result<T, C::DeserializationError>;

    fn next(&mut self) -> Option<Self::Item> {
        C::read_record(&mut self.reader)
    }
}

//! Run-level errors.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};

/// Boxed error produced by a record format.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Sorting phase an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading the input and writing sorted runs.
    RunGeneration,
    /// Pairwise merging of runs.
    Merge,
    /// Copying the final run to the output.
    Finalize,
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::RunGeneration => write!(f, "run generation"),
            Phase::Merge => write!(f, "merge"),
            Phase::Finalize => write!(f, "finalize"),
        }
    }
}

/// Error raised while creating, reading, writing or deleting a run.
#[derive(Debug)]
pub enum RunError {
    /// Temporary run file could not be created or removed.
    Resource {
        phase: Phase,
        run: Option<PathBuf>,
        source: io::Error,
    },
    /// Run data could not be read or decoded.
    Read { phase: Phase, run: PathBuf, source: BoxError },
    /// Run data could not be encoded or written.
    Write { phase: Phase, run: PathBuf, source: BoxError },
    /// Output sink write error.
    Output(io::Error),
    /// Sorting was cancelled.
    Cancelled(Phase),
}

impl RunError {
    pub(crate) fn resource(phase: Phase, run: Option<&Path>, source: io::Error) -> Self {
        RunError::Resource {
            phase,
            run: run.map(Path::to_path_buf),
            source,
        }
    }

    pub(crate) fn read(phase: Phase, run: &Path, source: impl Into<BoxError>) -> Self {
        RunError::Read {
            phase,
            run: run.to_path_buf(),
            source: source.into(),
        }
    }

    pub(crate) fn write(phase: Phase, run: &Path, source: impl Into<BoxError>) -> Self {
        RunError::Write {
            phase,
            run: run.to_path_buf(),
            source: source.into(),
        }
    }

    /// Returns the phase the error occurred in, if known.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            RunError::Resource { phase, .. } => Some(*phase),
            RunError::Read { phase, .. } => Some(*phase),
            RunError::Write { phase, .. } => Some(*phase),
            RunError::Output(_) => Some(Phase::Finalize),
            RunError::Cancelled(phase) => Some(*phase),
        }
    }

    /// Checks if the error is caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled(_))
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RunError::Resource { source, .. } => Some(source),
            RunError::Read { source, .. } => Some(source.as_ref()),
            RunError::Write { source, .. } => Some(source.as_ref()),
            RunError::Output(err) => Some(err),
            RunError::Cancelled(_) => None,
        }
    }
}

impl Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Resource {
                phase,
                run: Some(run),
                source,
            } => write!(f, "{}: run file {} not managed: {}", phase, run.display(), source),
            RunError::Resource { phase, run: None, source } => {
                write!(f, "{}: run file not created: {}", phase, source)
            }
            RunError::Read { phase, run, source } => {
                write!(f, "{}: run {} read error: {}", phase, run.display(), source)
            }
            RunError::Write { phase, run, source } => {
                write!(f, "{}: run {} write error: {}", phase, run.display(), source)
            }
            RunError::Output(err) => write!(f, "output write error: {}", err),
            RunError::Cancelled(phase) => write!(f, "sorting cancelled during {}", phase),
        }
    }
}

impl From<RunError> for io::Error {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Output(err) => err,
            err => io::Error::new(io::ErrorKind::Other, err),
        }
    }
}

//! Two-way merger.

use std::cmp::Ordering;
use std::fmt;

use crate::cancel::CancelToken;
use crate::error::{Phase, RunError};
use crate::format::RunFormat;
use crate::run::{Run, RunStore};

/// Merge input side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Two-way merger implementation.
/// Merges two sorted inputs into a single sorted output keeping one lookahead item per input.
///
/// When the items of both inputs are equal the left one is returned first, so merging
/// preserves the relative order of equal items and the result is deterministic.
pub struct TwoWayMerger<T, L, R, F> {
    left: L,
    right: R,
    left_head: Option<T>,
    right_head: Option<T>,
    compare: F,
    initiated: bool,
    failed: bool,
}

impl<T, E, L, R, F> TwoWayMerger<T, L, R, F>
where
    L: Iterator<Item = Result<T, E>>,
    R: Iterator<Item = Result<T, E>>,
    F: Fn(&T, &T) -> Ordering,
{
    /// Creates an instance of a two-way merger.
    /// Input items should be sorted according to `compare` otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `left` - Left input, wins ties
    /// * `right` - Right input
    /// * `compare` - Function to be used to compare items
    pub fn new<IL, IR>(left: IL, right: IR, compare: F) -> Self
    where
        IL: IntoIterator<IntoIter = L>,
        IR: IntoIterator<IntoIter = R>,
    {
        TwoWayMerger {
            left: left.into_iter(),
            right: right.into_iter(),
            left_head: None,
            right_head: None,
            compare,
            initiated: false,
            failed: false,
        }
    }
}

impl<T, E, L, R, F> Iterator for TwoWayMerger<T, L, R, F>
where
    L: Iterator<Item = Result<T, E>>,
    R: Iterator<Item = Result<T, E>>,
    F: Fn(&T, &T) -> Ordering,
{
    type Item = Result<T, (Side, E)>;

    /// Returns the next item from the inputs in ascending order.
    /// After the first input error the merger is exhausted.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if !self.initiated {
            self.initiated = true;
            match self.left.next().transpose() {
                Ok(item) => self.left_head = item,
                Err(err) => return self.fail(Side::Left, err),
            }
            match self.right.next().transpose() {
                Ok(item) => self.right_head = item,
                Err(err) => return self.fail(Side::Right, err),
            }
        }

        let side = match (&self.left_head, &self.right_head) {
            (Some(left), Some(right)) => match (self.compare)(left, right) {
                Ordering::Greater => Side::Right,
                Ordering::Less | Ordering::Equal => Side::Left,
            },
            (Some(_), None) => Side::Left,
            (None, Some(_)) => Side::Right,
            (None, None) => return None,
        };

        let (head, input) = match side {
            Side::Left => (self.left_head.take(), self.left.next()),
            Side::Right => (self.right_head.take(), self.right.next()),
        };

        match input.transpose() {
            Ok(next) => match side {
                Side::Left => self.left_head = next,
                Side::Right => self.right_head = next,
            },
            Err(err) => return self.fail(side, err),
        }

        return head.map(Ok);
    }
}

impl<T, L, R, F> TwoWayMerger<T, L, R, F> {
    fn fail<E>(&mut self, side: Side, err: E) -> Option<Result<T, (Side, E)>> {
        self.failed = true;
        Some(Err((side, err)))
    }
}

/// Merges two runs into a new one.
///
/// Both runs are consumed: on success they are deleted after the merged run is sealed, on failure
/// they are dropped along with the partially written output, which removes their files as well.
/// If `right` is [`None`] the left run is returned as is without being rewritten.
///
/// # Arguments
/// * `store` - Store the merged run is created in
/// * `left` - Left run, its items precede equal items of the right one
/// * `right` - Right run
/// * `compare` - Function to be used to compare items
/// * `cancel` - Cancellation token checked before every item
pub fn merge_pair<T, C, F>(
    store: &RunStore,
    left: Run<T, C>,
    right: Option<Run<T, C>>,
    compare: F,
    cancel: &CancelToken,
) -> Result<Run<T, C>, RunError>
where
    C: RunFormat<T>,
    F: Fn(&T, &T) -> Ordering,
{
    let right = match right {
        Some(right) => right,
        None => {
            log::trace!("run {} passed through", left.id().display());
            return Ok(left);
        }
    };

    let mut writer = store
        .create::<T, C>()
        .map_err(|err| RunError::resource(Phase::Merge, None, err))?;

    {
        let left_reader = store
            .open(&left)
            .map_err(|err| RunError::read(Phase::Merge, left.id(), err))?;
        let right_reader = store
            .open(&right)
            .map_err(|err| RunError::read(Phase::Merge, right.id(), err))?;

        for item in TwoWayMerger::new(left_reader, right_reader, compare) {
            cancel.check(Phase::Merge)?;

            let item = item.map_err(|(side, err)| match side {
                Side::Left => RunError::read(Phase::Merge, left.id(), err),
                Side::Right => RunError::read(Phase::Merge, right.id(), err),
            })?;
            writer
                .push(&item)
                .map_err(|err| RunError::write(Phase::Merge, writer.id(), err))?;
        }
    }

    let output_id = writer.id().to_path_buf();
    let merged = writer
        .finish()
        .map_err(|err| RunError::write(Phase::Merge, &output_id, err))?;

    log::debug!(
        "runs {} ({} records) and {} ({} records) merged into {}",
        left.id().display(),
        left.len(),
        right.id().display(),
        right.len(),
        merged.id().display()
    );

    for run in [left, right] {
        let run_id = run.id().to_path_buf();
        run.delete()
            .map_err(|err| RunError::resource(Phase::Merge, Some(&run_id), err))?;
    }

    return Ok(merged);
}

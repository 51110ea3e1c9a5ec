//! External sorter.

use log;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display};
use std::io;
use std::io::prelude::*;
use std::marker::PhantomData;
use std::path::Path;

use rayon::slice::ParallelSliceMut;

use crate::block::{Block, BlockBuilder, LimitedBlockBuilder};
use crate::cancel::CancelToken;
use crate::engine::MergeEngine;
use crate::error::{Phase, RunError};
use crate::finalize::{SortStats, SortedRun};
use crate::format::{RmpFormat, RunFormat};
use crate::registry::RunRegistry;
use crate::run::{Run, RunStore};

/// Sorting error.
#[derive(Debug)]
pub enum SortError<I: Error> {
    /// Sorter configuration is invalid.
    Config(String),
    /// Temporary directory creation error.
    TempDir(io::Error),
    /// Workers thread pool initialization error.
    ThreadPoolBuildError(rayon::ThreadPoolBuildError),
    /// Run file, merge or output error.
    Run(RunError),
    /// Input data stream error
    InputError(I),
}

impl<I: Error> SortError<I> {
    /// Checks if sorting was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SortError::Run(err) if err.is_cancelled())
    }
}

impl<I> Error for SortError<I>
where
    I: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::Config(_) => None,
            SortError::TempDir(err) => Some(err),
            SortError::ThreadPoolBuildError(err) => Some(err),
            SortError::Run(err) => Some(err),
            SortError::InputError(err) => Some(err),
        }
    }
}

impl<I: Error> Display for SortError<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::Config(reason) => write!(f, "invalid sorter configuration: {}", reason),
            SortError::TempDir(err) => write!(f, "temporary directory not created: {}", err),
            SortError::ThreadPoolBuildError(err) => write!(f, "thread pool initialization failed: {}", err),
            SortError::Run(err) => write!(f, "{}", err),
            SortError::InputError(err) => write!(f, "input data stream error: {}", err),
        }
    }
}

impl<I: Error> From<RunError> for SortError<I> {
    fn from(err: RunError) -> Self {
        SortError::Run(err)
    }
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone)]
pub struct ExternalSorterBuilder<T, E, B = LimitedBlockBuilder, C = RmpFormat>
where
    T: Send,
    E: Error,
    B: BlockBuilder<T>,
    C: RunFormat<T>,
{
    /// Number of threads to be used to sort and merge data in parallel.
    threads_number: Option<usize>,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Maximum number of run pairs merged at the same time.
    merge_concurrency: Option<usize>,
    /// Cancellation token.
    cancel: CancelToken,
    /// Block builder.
    block_builder: B,

    /// Run record format.
    format: PhantomData<C>,
    /// Input item type.
    item_type: PhantomData<T>,
    /// Input error type.
    input_error_type: PhantomData<E>,
}

impl<T, E, B, C> ExternalSorterBuilder<T, E, B, C>
where
    T: Send,
    E: Error,
    B: BlockBuilder<T>,
    C: RunFormat<T>,
{
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter<T, E, B, C>, SortError<E>> {
        ExternalSorter::new(
            self.threads_number,
            self.tmp_dir.as_deref(),
            self.block_builder,
            self.rw_buf_size,
            self.merge_concurrency,
            self.cancel,
        )
    }

    /// Sets number of threads to be used to sort and merge data in parallel.
    pub fn with_threads_number(mut self, threads_number: usize) -> ExternalSorterBuilder<T, E, B, C> {
        self.threads_number = Some(threads_number);
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder<T, E, B, C> {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets block builder.
    pub fn with_buffer(mut self, block_builder: B) -> ExternalSorterBuilder<T, E, B, C> {
        self.block_builder = block_builder;
        return self;
    }

    /// Sets run file read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder<T, E, B, C> {
        self.rw_buf_size = Some(buf_size);
        return self;
    }

    /// Sets maximum number of run pairs merged at the same time.
    /// Every merge keeps three files open.
    pub fn with_merge_concurrency(mut self, merge_concurrency: usize) -> ExternalSorterBuilder<T, E, B, C> {
        self.merge_concurrency = Some(merge_concurrency);
        return self;
    }

    /// Sets cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> ExternalSorterBuilder<T, E, B, C> {
        self.cancel = cancel;
        return self;
    }
}

impl<T, E, B, C> Default for ExternalSorterBuilder<T, E, B, C>
where
    T: Send,
    E: Error,
    B: BlockBuilder<T>,
    C: RunFormat<T>,
{
    fn default() -> Self {
        ExternalSorterBuilder {
            threads_number: None,
            tmp_dir: None,
            rw_buf_size: None,
            merge_concurrency: None,
            cancel: CancelToken::new(),
            block_builder: B::default(),
            format: PhantomData,
            item_type: PhantomData,
            input_error_type: PhantomData,
        }
    }
}

/// External sorter.
pub struct ExternalSorter<T, E, B = LimitedBlockBuilder, C = RmpFormat>
where
    T: Send,
    E: Error,
    B: BlockBuilder<T>,
    C: RunFormat<T>,
{
    /// Sorting and merging thread pool.
    thread_pool: rayon::ThreadPool,
    /// Directory every sort invocation creates its temporary directory in.
    tmp_dir: Option<Box<Path>>,
    /// Block builder.
    block_builder: B,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Maximum number of run pairs merged at the same time.
    merge_concurrency: usize,
    /// Cancellation token.
    cancel: CancelToken,

    /// Run record format.
    format: PhantomData<C>,
    /// Input item type.
    item_type: PhantomData<T>,
    /// Input error type.
    input_error_type: PhantomData<E>,
}

impl<T, E, B, C> ExternalSorter<T, E, B, C>
where
    T: Send,
    E: Error,
    B: BlockBuilder<T>,
    C: RunFormat<T>,
{
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `threads_number` - Number of threads to be used to sort and merge data in parallel. If the parameter is
    ///   [`None`] threads number will be selected based on available CPU core number.
    /// * `tmp_path` - Directory to be used to store temporary data. If paramater is [`None`] default OS temporary
    ///   directory will be used.
    /// * `block_builder` - An instance of a block builder that will be used for block creation.
    /// * `rw_buf_size` - Run files read/write buffer size.
    /// * `merge_concurrency` - Maximum number of run pairs merged at the same time. If the parameter is [`None`]
    ///   the number of threads is used.
    /// * `cancel` - Cancellation token.
    pub fn new(
        threads_number: Option<usize>,
        tmp_path: Option<&Path>,
        block_builder: B,
        rw_buf_size: Option<usize>,
        merge_concurrency: Option<usize>,
        cancel: CancelToken,
    ) -> Result<Self, SortError<E>> {
        block_builder.validate().map_err(SortError::Config)?;
        if rw_buf_size == Some(0) {
            return Err(SortError::Config("read/write buffer size must be positive".to_string()));
        }
        if merge_concurrency == Some(0) {
            return Err(SortError::Config("merge concurrency must be positive".to_string()));
        }

        let thread_pool = Self::init_thread_pool(threads_number)?;
        let merge_concurrency = merge_concurrency.unwrap_or_else(|| thread_pool.current_num_threads());
        log::info!("merging up to {} run pairs at a time", merge_concurrency);

        if let Some(tmp_path) = tmp_path {
            log::info!("using {} as a temporary directory", tmp_path.display());
        } else {
            log::info!("using default temporary directory");
        }

        return Ok(ExternalSorter {
            rw_buf_size,
            block_builder,
            thread_pool,
            merge_concurrency,
            cancel,
            tmp_dir: tmp_path.map(Into::into),
            format: PhantomData,
            item_type: PhantomData,
            input_error_type: PhantomData,
        });
    }

    fn init_thread_pool(threads_number: Option<usize>) -> Result<rayon::ThreadPool, SortError<E>> {
        let mut thread_pool_builder = rayon::ThreadPoolBuilder::new();

        if let Some(threads_number) = threads_number {
            log::info!("initializing thread-pool (threads: {})", threads_number);
            thread_pool_builder = thread_pool_builder.num_threads(threads_number);
        } else {
            log::info!("initializing thread-pool (threads: default)");
        }
        let thread_pool = thread_pool_builder
            .build()
            .map_err(|err| SortError::ThreadPoolBuildError(err))?;

        return Ok(thread_pool);
    }

    /// Returns the sorter cancellation token.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Sorts data from the input.
    /// Returns the sorted data which can be copied to an output or iterated over.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    pub fn sort<I>(&self, input: I) -> Result<SortedRun<T, C>, SortError<E>>
    where
        T: Ord,
        I: IntoIterator<Item = Result<T, E>>,
    {
        self.sort_by(input, T::cmp)
    }

    /// Sorts data from the input using a custom compare function.
    /// Returns the sorted data which can be copied to an output or iterated over.
    ///
    /// Sorting is stable: items the compare function considers equal keep their input order.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    /// * `compare` - Function to be used to compare items
    pub fn sort_by<I, F>(&self, input: I, compare: F) -> Result<SortedRun<T, C>, SortError<E>>
    where
        I: IntoIterator<Item = Result<T, E>>,
        F: Fn(&T, &T) -> Ordering + Sync + Send + Copy,
    {
        let store = RunStore::new(self.tmp_dir.as_deref(), self.rw_buf_size).map_err(SortError::TempDir)?;
        let mut registry = RunRegistry::new();

        self.generate_runs(input, compare, &store, &mut registry)?;

        let records = registry.records();
        let runs = registry.len();
        log::debug!("run generation done (runs: {}, records: {})", runs, records);

        let engine = MergeEngine::new(&store, &self.thread_pool, self.merge_concurrency, compare, &self.cancel);
        let merge_passes = engine.merge_all(&mut registry)?;

        let stats = SortStats {
            records,
            runs,
            merge_passes,
        };
        log::info!(
            "external sort done (records: {}, runs: {}, merge passes: {})",
            stats.records,
            stats.runs,
            stats.merge_passes
        );

        return Ok(SortedRun::new(registry.into_single(), store, self.cancel.clone(), stats));
    }

    /// Sorts data from the input using a custom compare function and writes the result to the output
    /// in the run record format.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    /// * `compare` - Function to be used to compare items
    /// * `output` - Output the sorted data is written to
    pub fn sort_into<I, F, W>(&self, input: I, compare: F, output: &mut W) -> Result<SortStats, SortError<E>>
    where
        I: IntoIterator<Item = Result<T, E>>,
        F: Fn(&T, &T) -> Ordering + Sync + Send + Copy,
        W: Write,
    {
        let sorted = self.sort_by(input, compare)?;
        let stats = *sorted.stats();
        sorted.write_to(output)?;

        return Ok(stats);
    }

    fn generate_runs<I, F>(
        &self,
        input: I,
        compare: F,
        store: &RunStore,
        registry: &mut RunRegistry<T, C>,
    ) -> Result<(), SortError<E>>
    where
        I: IntoIterator<Item = Result<T, E>>,
        F: Fn(&T, &T) -> Ordering + Sync + Send,
    {
        let mut block = self.block_builder.build();

        for item in input.into_iter() {
            self.cancel.check(Phase::RunGeneration)?;

            match item {
                Ok(item) => block.push(item),
                Err(err) => return Err(SortError::InputError(err)),
            }

            if block.is_full() {
                registry.push(self.create_run(block, &compare, store)?);
                block = self.block_builder.build();
            }
        }

        if !block.is_empty() {
            registry.push(self.create_run(block, &compare, store)?);
        }

        return Ok(());
    }

    fn create_run<F>(&self, mut block: B::Block, compare: &F, store: &RunStore) -> Result<Run<T, C>, RunError>
    where
        F: Fn(&T, &T) -> Ordering + Sync + Send,
    {
        log::debug!("sorting block data ({} records) ...", block.len());
        self.thread_pool.install(|| {
            block.par_sort_by(compare);
        });

        let mut writer = store
            .create::<T, C>()
            .map_err(|err| RunError::resource(Phase::RunGeneration, None, err))?;

        for item in block {
            writer
                .push(&item)
                .map_err(|err| RunError::write(Phase::RunGeneration, writer.id(), err))?;
        }

        let run_id = writer.id().to_path_buf();
        let run = writer
            .finish()
            .map_err(|err| RunError::write(Phase::RunGeneration, &run_id, err))?;
        log::debug!("run {} saved ({} records)", run.id().display(), run.len());

        return Ok(run);
    }
}

impl<T, E, B, C> Debug for ExternalSorter<T, E, B, C>
where
    T: Send,
    E: Error,
    B: BlockBuilder<T>,
    C: RunFormat<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalSorter")
            .field("threads", &self.thread_pool.current_num_threads())
            .field("tmp_dir", &self.tmp_dir)
            .field("rw_buf_size", &self.rw_buf_size)
            .field("merge_concurrency", &self.merge_concurrency)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::{self, ErrorKind};

    use rand::seq::SliceRandom;
    use rand::Rng;
    use rstest::*;

    use super::{ExternalSorter, ExternalSorterBuilder, LimitedBlockBuilder, SortError};
    use crate::cancel::CancelToken;
    use crate::error::{Phase, RunError};
    use crate::finalize::SortStats;
    use crate::format::LinesFormat;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir_in("./").unwrap()
    }

    fn is_dir_empty(tmp_dir: &tempfile::TempDir) -> bool {
        fs::read_dir(tmp_dir.path()).unwrap().next().is_none()
    }

    fn lines_sorter(tmp_dir: &tempfile::TempDir, block_size: usize) -> ExternalSorter<String, io::Error, LimitedBlockBuilder, LinesFormat> {
        ExternalSorterBuilder::new()
            .with_buffer(LimitedBlockBuilder::new(block_size, true))
            .with_threads_number(2)
            .with_tmp_dir(tmp_dir.path())
            .build()
            .unwrap()
    }

    fn lines(items: &[&str]) -> Vec<Result<String, io::Error>> {
        Vec::from_iter(items.iter().map(|item| Ok(item.to_string())))
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_external_sorter(tmp_dir: tempfile::TempDir, #[case] reversed: bool) {
        let input_sorted = 0..100;

        let mut input_shuffled = Vec::from_iter(input_sorted.clone());
        input_shuffled.shuffle(&mut rand::thread_rng());

        let input: Vec<Result<i32, io::Error>> = Vec::from_iter(input_shuffled.into_iter().map(|item| Ok(item)));

        let sorter: ExternalSorter<i32, _> = ExternalSorterBuilder::new()
            .with_buffer(LimitedBlockBuilder::new(8, true))
            .with_threads_number(2)
            .with_merge_concurrency(3)
            .with_tmp_dir(tmp_dir.path())
            .build()
            .unwrap();

        let compare = if reversed {
            |a: &i32, b: &i32| a.cmp(b).reverse()
        } else {
            |a: &i32, b: &i32| a.cmp(b)
        };

        let result = sorter.sort_by(input, compare).unwrap();
        assert_eq!(
            result.stats(),
            &SortStats {
                records: 100,
                runs: 13,
                merge_passes: 4
            }
        );

        let actual_result: Result<Vec<i32>, _> = result.collect();
        let actual_result = actual_result.unwrap();
        let expected_result = if reversed {
            Vec::from_iter(input_sorted.clone().rev())
        } else {
            Vec::from_iter(input_sorted.clone())
        };

        assert_eq!(actual_result, expected_result);
        assert!(is_dir_empty(&tmp_dir));
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_external_sorter_stability(tmp_dir: tempfile::TempDir, #[case] reversed: bool) {
        let input_sorted = (0..20).flat_map(|x| (0..5).map(move |y| (x, y)));

        let mut input_shuffled = Vec::from_iter(input_sorted.clone());
        input_shuffled.shuffle(&mut rand::thread_rng());
        // sort input by the second field to check sorting stability
        input_shuffled.sort_by(|a: &(i32, i32), b: &(i32, i32)| {
            if reversed {
                a.1.cmp(&b.1).reverse()
            } else {
                a.1.cmp(&b.1)
            }
        });

        let input: Vec<Result<(i32, i32), io::Error>> = Vec::from_iter(input_shuffled.into_iter().map(|item| Ok(item)));

        let sorter: ExternalSorter<(i32, i32), _> = ExternalSorterBuilder::new()
            .with_buffer(LimitedBlockBuilder::new(8, true))
            .with_threads_number(2)
            .with_tmp_dir(tmp_dir.path())
            .build()
            .unwrap();

        let compare = if reversed {
            |a: &(i32, i32), b: &(i32, i32)| a.0.cmp(&b.0).reverse()
        } else {
            |a: &(i32, i32), b: &(i32, i32)| a.0.cmp(&b.0)
        };

        let result = sorter.sort_by(input, compare).unwrap();

        let actual_result: Result<Vec<(i32, i32)>, _> = result.collect();
        let actual_result = actual_result.unwrap();
        let expected_result = if reversed {
            Vec::from_iter(input_sorted.clone().rev())
        } else {
            Vec::from_iter(input_sorted.clone())
        };

        assert_eq!(actual_result, expected_result)
    }

    #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    struct Person {
        name: String,
        surname: String,
        age: u8,
    }

    #[rstest]
    fn test_sort_custom_type(tmp_dir: tempfile::TempDir) {
        let person = |name: &str, surname: &str, age: u8| Person {
            name: name.to_string(),
            surname: surname.to_string(),
            age,
        };
        let people = vec![
            person("Tom", "Jones", 41),
            person("Ann", "Lee", 29),
            person("Bob", "Gray", 35),
            person("Eve", "Stone", 29),
            person("Jim", "Gray", 52),
        ];

        let sorter: ExternalSorter<Person, io::Error> = ExternalSorterBuilder::new()
            .with_buffer(LimitedBlockBuilder::new(2, false))
            .with_threads_number(2)
            .with_rw_buf_size(64)
            .with_tmp_dir(tmp_dir.path())
            .build()
            .unwrap();

        let sorted = sorter
            .sort_by(people.clone().into_iter().map(Ok), |a: &Person, b: &Person| {
                a.surname.cmp(&b.surname).then(a.age.cmp(&b.age))
            })
            .unwrap();

        let actual_result: Result<Vec<Person>, _> = sorted.collect();
        assert_eq!(
            actual_result.unwrap(),
            vec![
                people[2].clone(),
                people[4].clone(),
                people[0].clone(),
                people[1].clone(),
                people[3].clone(),
            ]
        );
    }

    #[rstest]
    fn test_sort_lines(tmp_dir: tempfile::TempDir) {
        let sorter = lines_sorter(&tmp_dir, 2);

        let mut output = Vec::new();
        let stats = sorter.sort_into(lines(&["c", "a", "b"]), String::cmp, &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "a\nb\nc\n");
        assert_eq!(
            stats,
            SortStats {
                records: 3,
                runs: 2,
                merge_passes: 1
            }
        );
        assert!(is_dir_empty(&tmp_dir));
    }

    #[rstest]
    fn test_sort_ties_keep_left_first(tmp_dir: tempfile::TempDir) {
        let input: Vec<Result<(i32, char), io::Error>> =
            vec![Ok((2, 'a')), Ok((1, 'b')), Ok((2, 'c')), Ok((0, 'd')), Ok((1, 'e'))];

        let sorter: ExternalSorter<(i32, char), _> = ExternalSorterBuilder::new()
            .with_buffer(LimitedBlockBuilder::new(2, false))
            .with_threads_number(2)
            .with_tmp_dir(tmp_dir.path())
            .build()
            .unwrap();

        let result = sorter
            .sort_by(input, |a: &(i32, char), b: &(i32, char)| a.0.cmp(&b.0))
            .unwrap();
        assert_eq!(result.stats().runs, 3);
        assert_eq!(result.stats().merge_passes, 2);

        let actual_result: Result<Vec<(i32, char)>, _> = result.collect();
        assert_eq!(
            actual_result.unwrap(),
            vec![(0, 'd'), (1, 'b'), (1, 'e'), (2, 'a'), (2, 'c')]
        );
    }

    #[rstest]
    #[case(vec![], 0)]
    #[case(vec!["b", "a", "c"], 1)]
    fn test_sort_without_merge(tmp_dir: tempfile::TempDir, #[case] items: Vec<&str>, #[case] expected_runs: usize) {
        let sorter = lines_sorter(&tmp_dir, 10);

        let sorted = sorter.sort_by(lines(&items), String::cmp).unwrap();
        assert_eq!(sorted.stats().runs, expected_runs);
        assert_eq!(sorted.stats().merge_passes, 0);

        let mut expected = Vec::from_iter(items.iter().map(|item| item.to_string()));
        expected.sort();
        let actual: Result<Vec<String>, _> = sorted.collect();
        assert_eq!(actual.unwrap(), expected);
        assert!(is_dir_empty(&tmp_dir));
    }

    #[rstest]
    fn test_sort_sorted_input_unchanged(tmp_dir: tempfile::TempDir) {
        let sorter = lines_sorter(&tmp_dir, 3);
        let items = ["alpha", "alpha", "beta", "delta", "epsilon", "gamma", "omega"];

        let mut output = Vec::new();
        sorter.sort_into(lines(&items), String::cmp, &mut output).unwrap();

        let mut expected = items.join("\n");
        expected.push('\n');
        assert_eq!(String::from_utf8(output).unwrap(), expected);
    }

    #[rstest]
    fn test_sort_permutation(tmp_dir: tempfile::TempDir) {
        let mut rng = rand::thread_rng();
        let items = Vec::from_iter((0..500).map(|_| format!("{:03}", rng.gen_range(0..100))));

        let sorter = lines_sorter(&tmp_dir, 16);
        let mut output = Vec::new();
        let stats = sorter
            .sort_into(items.iter().map(|item| Ok(item.clone())), String::cmp, &mut output)
            .unwrap();
        assert_eq!(stats.records, 500);

        let actual = Vec::from_iter(String::from_utf8(output).unwrap().lines().map(String::from));
        assert!(actual.windows(2).all(|pair| pair[0] <= pair[1]));

        let mut expected = items.clone();
        expected.sort();
        assert_eq!(actual, expected);
    }

    #[rstest]
    fn test_sort_input_error(tmp_dir: tempfile::TempDir) {
        let sorter = lines_sorter(&tmp_dir, 2);

        let mut input = lines(&["d", "c", "b", "a"]);
        input.push(Err(io::Error::new(ErrorKind::Other, "test error")));
        input.extend(lines(&["e"]));

        let err = sorter.sort_by(input, String::cmp).unwrap_err();
        assert!(matches!(err, SortError::InputError(_)));
        assert_eq!(err.to_string(), "input data stream error: test error");
        assert!(is_dir_empty(&tmp_dir));
    }

    #[rstest]
    fn test_sort_multiline_record(tmp_dir: tempfile::TempDir) {
        let sorter = lines_sorter(&tmp_dir, 10);

        let err = sorter.sort_by(lines(&["c", "b\na"]), String::cmp).unwrap_err();
        match err {
            SortError::Run(RunError::Write { phase, source, .. }) => {
                assert_eq!(phase, Phase::RunGeneration);
                assert_eq!(source.to_string(), "line record contains a line feed");
            }
            err => panic!("unexpected error: {}", err),
        }
        assert!(is_dir_empty(&tmp_dir));
    }

    #[rstest]
    fn test_sort_cancelled(tmp_dir: tempfile::TempDir) {
        let cancel = CancelToken::new();
        let sorter: ExternalSorter<String, io::Error, _, LinesFormat> = ExternalSorterBuilder::new()
            .with_buffer(LimitedBlockBuilder::new(2, false))
            .with_tmp_dir(tmp_dir.path())
            .with_cancel_token(cancel.clone())
            .build()
            .unwrap();

        let input = lines(&["b", "a", "c"]).into_iter().enumerate().map(|(idx, item)| {
            if idx == 2 {
                cancel.cancel();
            }
            item
        });

        let err = sorter.sort_by(input, String::cmp).unwrap_err();
        assert!(err.is_cancelled());
        assert!(sorter.cancel_token().is_cancelled());
        assert!(is_dir_empty(&tmp_dir));
    }

    #[rstest]
    #[case(ExternalSorterBuilder::new().with_buffer(LimitedBlockBuilder::new(0, false)))]
    #[case(ExternalSorterBuilder::new().with_buffer(LimitedBlockBuilder::with_memory_budget(64, 128)))]
    #[case(ExternalSorterBuilder::new().with_rw_buf_size(0))]
    #[case(ExternalSorterBuilder::new().with_merge_concurrency(0))]
    fn test_sorter_config_error(#[case] builder: ExternalSorterBuilder<String, io::Error>) {
        let err = builder.build().unwrap_err();
        assert!(matches!(err, SortError::Config(_)));
    }
}

//! In-memory blocks runs are generated from.

use rayon;

/// Maximum number of records a block preallocates memory for.
pub const MAX_PREALLOCATED_RECORDS: usize = 1 << 20;

/// Block builder.
pub trait BlockBuilder<T: Send>: Default {
    type Block: Block<T>;

    /// Creates a new empty block.
    fn build(&self) -> Self::Block;

    /// Checks that built blocks are able to hold at least one record.
    fn validate(&self) -> Result<(), String>;
}

/// Bounded record buffer accumulated before being flushed into a run.
pub trait Block<T: Send>: IntoIterator<Item = T> + rayon::slice::ParallelSliceMut<T> + Send {
    /// Adds a new record to the block.
    fn push(&mut self, item: T);

    /// Returns the number of records in the block.
    fn len(&self) -> usize;

    /// Checks if the block reached its limit.
    fn is_full(&self) -> bool;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builder of blocks limited by record count.
#[derive(Debug, Clone)]
pub struct LimitedBlockBuilder {
    block_size: usize,
    preallocate: bool,
}

impl LimitedBlockBuilder {
    /// Creates a builder of blocks holding up to `block_size` records.
    /// If `preallocate` is set block memory is allocated upfront for at most
    /// [`MAX_PREALLOCATED_RECORDS`] records, the rest grows on demand.
    pub fn new(block_size: usize, preallocate: bool) -> Self {
        LimitedBlockBuilder {
            block_size,
            preallocate,
        }
    }

    /// Derives the block size from a memory budget and an estimated per-record size:
    /// `memory_budget / record_size` records per block.
    ///
    /// A budget that cannot hold a single record yields a zero block size which is rejected
    /// by [`BlockBuilder::validate`] when the sorter is built.
    pub fn with_memory_budget(memory_budget: u64, record_size: u64) -> Self {
        let block_size = memory_budget
            .checked_div(record_size)
            .map_or(0, |size| usize::try_from(size).unwrap_or(usize::MAX));

        log::debug!(
            "block size {} derived from {} bytes budget and {} bytes per record",
            block_size,
            memory_budget,
            record_size
        );

        LimitedBlockBuilder {
            block_size,
            preallocate: false,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl<T: Send> BlockBuilder<T> for LimitedBlockBuilder {
    type Block = LimitedBlock<T>;

    fn build(&self) -> Self::Block {
        if self.preallocate {
            LimitedBlock::with_capacity(self.block_size)
        } else {
            LimitedBlock::new(self.block_size)
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.block_size == 0 {
            Err("block size must be positive".to_string())
        } else {
            Ok(())
        }
    }
}

impl Default for LimitedBlockBuilder {
    fn default() -> Self {
        LimitedBlockBuilder {
            block_size: usize::MAX,
            preallocate: false,
        }
    }
}

/// Block limited by record count.
pub struct LimitedBlock<T> {
    limit: usize,
    inner: Vec<T>,
}

impl<T> LimitedBlock<T> {
    pub fn new(limit: usize) -> Self {
        LimitedBlock {
            limit,
            inner: Vec::new(),
        }
    }

    pub fn with_capacity(limit: usize) -> Self {
        LimitedBlock {
            limit,
            inner: Vec::with_capacity(limit.min(MAX_PREALLOCATED_RECORDS)),
        }
    }
}

impl<T: Send> Block<T> for LimitedBlock<T> {
    fn push(&mut self, item: T) {
        self.inner.push(item);
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn is_full(&self) -> bool {
        self.inner.len() >= self.limit
    }
}

impl<T> IntoIterator for LimitedBlock<T> {
    type Item = T;
    type IntoIter = <Vec<T> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<T: Send> rayon::slice::ParallelSliceMut<T> for LimitedBlock<T> {
    fn as_parallel_slice_mut(&mut self) -> &mut [T] {
        self.inner.as_mut_slice()
    }
}

#[cfg(test)]
mod test {
    use rayon::slice::ParallelSliceMut;
    use rstest::*;

    use super::{Block, BlockBuilder, LimitedBlockBuilder, MAX_PREALLOCATED_RECORDS};

    #[rstest]
    #[case(16, 16)]
    #[case(usize::MAX, MAX_PREALLOCATED_RECORDS)]
    fn test_limited_block_preallocation(#[case] block_size: usize, #[case] expected_capacity: usize) {
        let mut block = BlockBuilder::<u8>::build(&LimitedBlockBuilder::new(block_size, true));
        assert_eq!(block.inner.capacity(), expected_capacity);

        block.push(1);
        assert_eq!(block.is_full(), false);
    }

    #[test]
    fn test_limited_block() {
        let builder = LimitedBlockBuilder::new(2, true);
        let mut block = builder.build();

        block.push(1);
        assert_eq!(block.is_full(), false);
        block.push(0);
        assert_eq!(block.is_full(), true);

        block.par_sort_by(|a: &i32, b: &i32| a.cmp(b));
        let data = Vec::from_iter(block);
        assert_eq!(data, vec![0, 1]);
    }

    #[rstest]
    #[case(1024, 16, 64)]
    #[case(1000, 3, 333)]
    #[case(15, 16, 0)]
    #[case(1024, 0, 0)]
    fn test_memory_budget_block_size(#[case] budget: u64, #[case] record_size: u64, #[case] expected: usize) {
        let builder = LimitedBlockBuilder::with_memory_budget(budget, record_size);
        assert_eq!(builder.block_size(), expected);
    }

    #[test]
    fn test_block_size_validation() {
        assert!(BlockBuilder::<i32>::validate(&LimitedBlockBuilder::new(1, false)).is_ok());
        assert!(BlockBuilder::<i32>::validate(&LimitedBlockBuilder::new(0, false)).is_err());
        assert!(BlockBuilder::<i32>::validate(&LimitedBlockBuilder::with_memory_budget(8, 16)).is_err());
    }
}

#[cfg(feature = "memory-limit")]
pub mod mem {
    use deepsize;
    use rayon;

    use super::{Block, BlockBuilder};

    /// Builder of blocks limited by the memory their records occupy.
    #[derive(Debug, Clone)]
    pub struct MemoryLimitedBlockBuilder {
        memory_limit: u64,
    }

    impl MemoryLimitedBlockBuilder {
        pub fn new(memory_limit: u64) -> Self {
            MemoryLimitedBlockBuilder { memory_limit }
        }
    }

    impl<T: Send> BlockBuilder<T> for MemoryLimitedBlockBuilder
    where
        T: deepsize::DeepSizeOf,
    {
        type Block = MemoryLimitedBlock<T>;

        fn build(&self) -> Self::Block {
            MemoryLimitedBlock::new(self.memory_limit)
        }

        fn validate(&self) -> Result<(), String> {
            if self.memory_limit == 0 {
                Err("block memory limit must be positive".to_string())
            } else {
                Ok(())
            }
        }
    }

    impl Default for MemoryLimitedBlockBuilder {
        fn default() -> Self {
            MemoryLimitedBlockBuilder { memory_limit: u64::MAX }
        }
    }

    /// Block limited by consumed memory.
    /// A block is never full while empty so each block holds at least one record.
    pub struct MemoryLimitedBlock<T> {
        limit: u64,
        current_size: u64,
        inner: Vec<T>,
    }

    impl<T> MemoryLimitedBlock<T> {
        pub fn new(limit: u64) -> Self {
            MemoryLimitedBlock {
                limit,
                current_size: 0,
                inner: Vec::new(),
            }
        }

        pub fn mem_size(&self) -> u64 {
            self.current_size
        }
    }

    impl<T: Send> Block<T> for MemoryLimitedBlock<T>
    where
        T: deepsize::DeepSizeOf,
    {
        fn push(&mut self, item: T) {
            self.current_size += item.deep_size_of() as u64;
            self.inner.push(item);
        }

        fn len(&self) -> usize {
            self.inner.len()
        }

        fn is_full(&self) -> bool {
            !self.inner.is_empty() && self.current_size >= self.limit
        }
    }

    impl<T> IntoIterator for MemoryLimitedBlock<T> {
        type Item = T;
        type IntoIter = <Vec<T> as IntoIterator>::IntoIter;

        fn into_iter(self) -> Self::IntoIter {
            self.inner.into_iter()
        }
    }

    impl<T: Send> rayon::slice::ParallelSliceMut<T> for MemoryLimitedBlock<T> {
        fn as_parallel_slice_mut(&mut self) -> &mut [T] {
            self.inner.as_mut_slice()
        }
    }

    #[cfg(test)]
    mod test {
        use deepsize;

        use super::{Block, BlockBuilder, MemoryLimitedBlockBuilder};

        #[derive(Debug, Clone, PartialEq, Eq, deepsize::DeepSizeOf)]
        struct Entry {
            key: i64,
            line: String,
        }

        #[test]
        fn test_memory_limited_block() {
            let builder = MemoryLimitedBlockBuilder::new(76);
            let mut block = builder.build();
            assert_eq!(block.is_full(), false);

            let first = Entry {
                key: 0,                // 8 bytes
                line: "alpha!".into(), // 8 + 8 + 8 + 6 = 30 bytes
            };
            block.push(first.clone());
            assert_eq!(block.mem_size(), 38);
            assert_eq!(block.is_full(), false);

            let second = Entry {
                key: 1,                // 8 bytes
                line: "omega!".into(), // 8 + 8 + 8 + 6 = 30 bytes
            };
            block.push(second.clone());
            assert_eq!(block.mem_size(), 76);
            assert_eq!(block.is_full(), true);

            assert_eq!(Vec::from_iter(block), vec![first, second]);
        }

        #[test]
        fn test_memory_limit_validation() {
            assert!(BlockBuilder::<String>::validate(&MemoryLimitedBlockBuilder::new(0)).is_err());
            assert!(BlockBuilder::<String>::validate(&MemoryLimitedBlockBuilder::new(1)).is_ok());
        }
    }
}

//! `ext-merge-sort` is a rust external merge sort implementation.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. During the first phase the input is split into
//! blocks that fit in RAM, every block is sorted and saved to a temporary file called a run. During the second
//! phase the runs are merged pairwise, pass by pass, until a single sorted run is left, which is then copied to
//! the output. For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! `ext-merge-sort` supports the following features:
//!
//! * **Data agnostic:**
//!   it supports all data types that implement `serde` serialization/deserialization using `MessagePack`
//!   as a run format by default. Plain text lines are supported by [`LinesFormat`], other formats can be
//!   added by implementing [`RunFormat`].
//! * **Custom ordering:**
//!   any total order can be used to sort data. Sorting is stable.
//! * **Multithreading support:**
//!   blocks are sorted and independent runs are merged in multiple threads.
//! * **Bounded resources:**
//!   block size is limited by records count, by a memory budget or by consumed memory
//!   (`memory-limit` feature required), the number of concurrent merges can be limited as well.
//! * **Cancellation:**
//!   sorting can be cancelled from another thread using a [`CancelToken`].
//! * **No leftovers:**
//!   temporary files are removed whether sorting succeeds, fails or is cancelled.
//!
//! # Example
//!
//! ```no_run
//! use std::fs;
//! use std::io::{self, prelude::*};
//! use std::path;
//!
//! use ext_merge_sort::{ExternalSorter, ExternalSorterBuilder, LimitedBlockBuilder, LinesFormat};
//!
//! fn main() {
//!     let input_reader = io::BufReader::new(fs::File::open("input.txt").unwrap());
//!     let mut output_writer = io::BufWriter::new(fs::File::create("output.txt").unwrap());
//!
//!     let sorter: ExternalSorter<String, io::Error, LimitedBlockBuilder, LinesFormat> = ExternalSorterBuilder::new()
//!         .with_tmp_dir(path::Path::new("./"))
//!         .with_buffer(LimitedBlockBuilder::new(1_000_000, false))
//!         .build()
//!         .unwrap();
//!
//!     sorter.sort_into(input_reader.lines(), String::cmp, &mut output_writer).unwrap();
//! }
//! ```

pub mod block;
pub mod cancel;
pub mod engine;
pub mod error;
pub mod finalize;
pub mod format;
pub mod merger;
pub mod registry;
pub mod run;
pub mod sort;

pub use block::{Block, BlockBuilder, LimitedBlock, LimitedBlockBuilder};
pub use cancel::CancelToken;
pub use engine::MergeEngine;
pub use error::{Phase, RunError};
pub use finalize::{SortStats, SortedRun};
pub use format::{LinesFormat, RmpFormat, RunFormat};
pub use merger::{merge_pair, Side, TwoWayMerger};
pub use registry::RunRegistry;
pub use run::{Run, RunReader, RunStore, RunWriter};
pub use sort::{ExternalSorter, ExternalSorterBuilder, SortError};

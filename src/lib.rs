//! # topn-extract
//!
//! Per-source top-N extraction over a partitioned table of personalized
//! relevance scores stored as natural-log probabilities.
//!
//! Each source entity gets one round: every partition is reduced to at most
//! `N` candidates by a [`selector::LocalSelector`], candidates are grouped by
//! item id and fed to a single [`merge::GlobalMerge`], which keeps the global
//! top-N and converts it to probabilities. The [`driver::IterationDriver`]
//! runs one round per source, reading score slot `i` for the source at
//! position `i`.
//!
//! ```no_run
//! use topn_extract::{IterationDriver, MemorySink, PartitionedInput, RunPlan, ScoredItem};
//!
//! let input = PartitionedInput::split(
//!     vec![
//!         ScoredItem::new(1, vec![-0.1, -2.0]),
//!         ScoredItem::new(2, vec![-1.5, -0.3]),
//!     ],
//!     2,
//! );
//! let plan = RunPlan::new(vec![7, 3], 10)?;
//! let mut sink = MemorySink::new();
//! IterationDriver::new(plan, &input).run(&mut sink)?;
//! # Ok::<(), topn_extract::ExtractError>(())
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod input;
pub mod merge;
pub mod model;
pub mod output;
pub mod ranked;
pub mod selector;
pub mod shuffle;

// Re-export main types for convenience
pub use config::{ConfigOverrides, ExtractConfig};
pub use driver::{run_round, DriverState, IterationDriver, RoundReport, RoundScheduling, RunPlan};
pub use error::{ExtractError, Result};
pub use input::PartitionedInput;
pub use merge::{log_to_probability, GlobalMerge};
pub use model::{Candidate, ItemId, RoundContext, ScoredItem, TopResult};
pub use output::{format_result_line, EchoSink, FileSink, MemorySink, OutputSink};
pub use ranked::BoundedRankedSet;
pub use selector::{select_partition, LocalSelector};
pub use shuffle::{group_by_id, CandidateGroup};

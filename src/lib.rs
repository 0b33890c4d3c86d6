//! Low-overhead sampling profiler for parallel (MPI-style) programs.
//!
//! A loaded copy of this library periodically interrupts each worker
//! process, captures the native call stack from the signal handler into
//! a pre-allocated counter table, and at process exit writes per-rank
//! binary artifacts: the sample table and a snapshot of the executable
//! memory map. A later post-processing step resolves the raw addresses
//! against the snapshot and folds all ranks into one call tree for
//! hotspot and workload-balance analysis.
//!
//! ## Example
//!
//! Aggregating recorded stacks into a tree and ranking the hot frames:
//!
//! ```rust
//! use perflow::analysis::HotspotAnalyzer;
//! use perflow::resolve::ResolvedFrame;
//! use perflow::tree::TreeBuilder;
//! use perflow::{CallStack, CounterTable};
//!
//! // Record one stack the way the signal handler would.
//! let table = CounterTable::new(1024);
//! let mut stack = CallStack::new();
//! stack.set(&[0x400010, 0x400020]);
//! for _ in 0..3 {
//!     table.increment(&stack);
//! }
//!
//! // Aggregate into a call tree and rank the frames.
//! let builder = TreeBuilder::new();
//! let mut tree = builder.new_tree();
//! table.for_each(|stack, count| {
//!     let resolved: Vec<ResolvedFrame> = stack
//!         .frames()
//!         .iter()
//!         .map(|&addr| ResolvedFrame::unresolved(addr))
//!         .collect();
//!     builder.insert(&mut tree, &resolved, 0, count);
//! });
//! let top = HotspotAnalyzer::find_self_hotspots(&tree, 1);
//! assert_eq!(top[0].self_count, 3);
//! ```
//!
//! ## Injection
//!
//! Built as a `cdylib`, the library installs process entry/exit hooks;
//! they stay dormant unless `PERFLOW_ENABLE=1` is set in the target's
//! environment. Sampling is tuned with the `PERFLOW_*` variables (see
//! [`config`]) and rank identification is provided by an external
//! interceptor through [`runtime::perflow_set_rank`].

pub mod analysis;
pub mod artifact;
pub mod config;
pub mod error;
mod ffi;
pub mod map;
pub mod resolve;
pub mod runtime;
pub mod sampler;
pub mod stack;
pub mod table;
pub mod tree;

pub use analysis::{BalanceAnalyzer, BalanceReport, Hotspot, HotspotAnalyzer};
pub use config::{Config, TimerMethod};
pub use error::{DataError, DataResult, SamplerError};
pub use map::{MemoryMap, MemoryRegion};
pub use resolve::{AddressResolver, ResolvedFrame};
pub use sampler::{Sampler, State};
pub use stack::{CallStack, MAX_STACK_DEPTH};
pub use table::CounterTable;
pub use tree::{ArtifactInput, BuildMode, CallTree, CountMode, NodeId, TreeBuilder, TreeNode};

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use super::{BuildMode, CallTree, CountMode};
use crate::artifact::{libmap, samples};
use crate::error::{DataError, DataResult};
use crate::resolve::{AddressResolver, ResolvedFrame};

/// One per-rank pair of artifact paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactInput {
    pub samples: PathBuf,
    pub libmap: Option<PathBuf>,
    pub rank: i32,
}

/// Parses `samples[:libmap]:rank`, e.g. `run_rank_0.bin:run_rank_0.libmap:0`.
impl FromStr for ArtifactInput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rest, rank) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("`{s}` is missing a rank suffix"))?;
        let rank = rank
            .parse::<i32>()
            .map_err(|_| format!("`{rank}` is not a rank"))?;
        let (samples, libmap) = match rest.rsplit_once(':') {
            Some((samples, libmap)) if !libmap.is_empty() => {
                (samples, Some(PathBuf::from(libmap)))
            }
            Some((samples, _)) => (samples, None),
            None => (rest, None),
        };
        if samples.is_empty() {
            return Err(format!("`{s}` is missing the sample-table path"));
        }
        Ok(ArtifactInput {
            samples: PathBuf::from(samples),
            libmap,
            rank,
        })
    }
}

/// A failed batch load: how many artifact files made it in before the
/// first error.
#[derive(Debug, Error)]
#[error("loaded {loaded} artifact file(s) before failing: {error}")]
pub struct BuildFailure {
    pub loaded: usize,
    #[source]
    pub error: DataError,
}

/// Builds a [`CallTree`] from per-rank artifacts or in-memory stacks.
#[derive(Clone, Debug)]
pub struct TreeBuilder {
    pub build_mode: BuildMode,
    pub count_mode: CountMode,
    /// Wall time one sample stands for, used to derive execution time.
    pub time_per_sample_ns: u64,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        TreeBuilder {
            build_mode: BuildMode::ContextFree,
            count_mode: CountMode::Inclusive,
            time_per_sample_ns: 1_000_000,
        }
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_tree(&self) -> CallTree {
        CallTree::new(self.build_mode, self.count_mode)
    }

    /// Inserts one resolved stack (oldest frame first).
    pub fn insert(&self, tree: &mut CallTree, stack: &[ResolvedFrame], rank: i32, count: u64) {
        tree.insert(stack, rank, count, self.time_per_sample_ns);
    }

    /// Imports every input: reads the sample table and its map snapshot,
    /// resolves each stack against the rank's map and inserts it. Rank
    /// order does not affect the resulting counts.
    pub fn build_from_files(&self, inputs: &[ArtifactInput]) -> Result<CallTree, BuildFailure> {
        let mut tree = self.new_tree();
        let mut resolver = AddressResolver::new();
        let mut loaded = 0;
        for input in inputs {
            self.load_input(input, &mut tree, &mut resolver, &mut loaded)
                .map_err(|error| BuildFailure { loaded, error })?;
        }
        Ok(tree)
    }

    fn load_input(
        &self,
        input: &ArtifactInput,
        tree: &mut CallTree,
        resolver: &mut AddressResolver,
        loaded: &mut usize,
    ) -> DataResult<()> {
        if let Some(libmap_path) = &input.libmap {
            let library_map = libmap::read_memory_map(libmap_path)?;
            *loaded += 1;
            resolver.register_map(input.rank, library_map.map);
        }
        let table = samples::read_sample_table(&input.samples)?;
        *loaded += 1;
        tracing::debug!(
            rank = input.rank,
            stacks = table.entries.len(),
            samples = table.total_samples(),
            path = %input.samples.display(),
            "imported sample table"
        );
        for entry in &table.entries {
            let resolved = resolver.resolve_stack(&entry.frames, input.rank);
            tree.insert(&resolved, input.rank, entry.count, self.time_per_sample_ns);
        }
        Ok(())
    }
}

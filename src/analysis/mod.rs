use std::cmp::Reverse;

use crate::tree::{CallTree, CountMode, NodeId};

#[cfg(test)]
mod test;

/// One ranked frame in a hotspot report.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hotspot {
    #[cfg_attr(feature = "serde", serde(skip))]
    pub node: Option<NodeId>,
    pub library: String,
    pub offset: u64,
    pub location: String,
    pub self_count: u64,
    pub total_count: u64,
    /// `self_count` as a percentage of all samples in the tree.
    pub self_percentage: f64,
}

/// Ranks tree nodes by their sample counts.
pub struct HotspotAnalyzer;

impl HotspotAnalyzer {
    /// Top `n` frames by exclusive count. Ties break on total count,
    /// then library name and offset, so the ranking is deterministic and
    /// a shorter report is always a prefix of a longer one.
    pub fn find_self_hotspots(tree: &CallTree, n: usize) -> Vec<Hotspot> {
        Self::ranked(tree, n, |tree, id| {
            let node = tree.node(id);
            (node.self_count(), node.total_count())
        })
    }

    /// Top `n` frames by inclusive count.
    pub fn find_total_hotspots(tree: &CallTree, n: usize) -> Vec<Hotspot> {
        Self::ranked(tree, n, |tree, id| {
            let node = tree.node(id);
            (node.total_count(), node.self_count())
        })
    }

    fn ranked(
        tree: &CallTree,
        n: usize,
        key: impl Fn(&CallTree, NodeId) -> (u64, u64),
    ) -> Vec<Hotspot> {
        let mut ids: Vec<NodeId> = Vec::new();
        tree.pre_order(|id, _| {
            if id != tree.root() {
                ids.push(id);
            }
            true
        });
        ids.sort_by_key(|&id| {
            let (primary, secondary) = key(tree, id);
            let frame = tree.node(id).frame();
            (
                Reverse(primary),
                Reverse(secondary),
                frame.library.clone(),
                frame.offset,
            )
        });
        ids.truncate(n);

        let total_samples = tree.total_samples();
        ids.into_iter()
            .map(|id| {
                let node = tree.node(id);
                let frame = node.frame();
                Hotspot {
                    node: Some(id),
                    library: frame.library.clone(),
                    offset: frame.offset,
                    location: frame.location(),
                    self_count: node.self_count(),
                    total_count: node.total_count(),
                    self_percentage: percentage(node.self_count(), total_samples),
                }
            })
            .collect()
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Distribution of samples across ranks.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BalanceReport {
    pub mean: f64,
    pub stddev: f64,
    pub min: u64,
    pub max: u64,
    /// `(max - min) / mean`, 0 when no samples were collected.
    pub imbalance_factor: f64,
    pub most_loaded_process: i32,
    pub least_loaded_process: i32,
    /// Per-rank sample totals, rank-ascending.
    pub per_process: Vec<(i32, u64)>,
}

/// Computes per-rank workload statistics over a built tree.
pub struct BalanceAnalyzer;

impl BalanceAnalyzer {
    pub fn analyze(tree: &CallTree) -> BalanceReport {
        let per_process = Self::per_process_totals(tree);
        if per_process.is_empty() {
            return BalanceReport {
                most_loaded_process: -1,
                least_loaded_process: -1,
                ..BalanceReport::default()
            };
        }

        let n = per_process.len() as f64;
        let sum: u64 = per_process.iter().map(|&(_, c)| c).sum();
        let mean = sum as f64 / n;
        let variance = per_process
            .iter()
            .map(|&(_, c)| {
                let d = c as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let (most_loaded_process, max) = per_process
            .iter()
            .copied()
            .max_by_key(|&(rank, count)| (count, Reverse(rank)))
            .unwrap_or((-1, 0));
        let (least_loaded_process, min) = per_process
            .iter()
            .copied()
            .min_by_key(|&(rank, count)| (count, rank))
            .unwrap_or((-1, 0));

        let denominator = if mean == 0.0 { 1.0 } else { mean };
        BalanceReport {
            mean,
            stddev: variance.sqrt(),
            min,
            max,
            imbalance_factor: (max - min) as f64 / denominator,
            most_loaded_process,
            least_loaded_process,
            per_process,
        }
    }

    // Inclusive trees carry every rank's total at the root; exclusive
    // trees spread them over the leaves.
    fn per_process_totals(tree: &CallTree) -> Vec<(i32, u64)> {
        let mut totals: Vec<(i32, u64)> = tree.ranks().into_iter().map(|r| (r, 0)).collect();
        match tree.count_mode() {
            CountMode::Inclusive | CountMode::Both => {
                for (rank, count) in &mut totals {
                    *count = tree
                        .node(tree.root())
                        .per_process_counts()
                        .get(rank)
                        .copied()
                        .unwrap_or(0);
                }
            }
            CountMode::Exclusive => {
                tree.pre_order(|_, node| {
                    for (rank, count) in &mut totals {
                        *count += node.per_process_counts().get(rank).copied().unwrap_or(0);
                    }
                    true
                });
            }
        }
        totals
    }
}

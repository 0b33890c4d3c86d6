use super::{BalanceAnalyzer, HotspotAnalyzer};
use crate::resolve::ResolvedFrame;
use crate::tree::{CountMode, TreeBuilder};

fn rf(library: &str, offset: u64) -> ResolvedFrame {
    ResolvedFrame {
        raw: offset,
        library: library.to_owned(),
        offset,
    }
}

fn two_rank_tree() -> crate::tree::CallTree {
    let builder = TreeBuilder::new();
    let mut tree = builder.new_tree();
    let a = rf("app", 0xa);
    let b = rf("app", 0xb);
    builder.insert(&mut tree, &[a.clone(), b.clone(), rf("app", 0xc)], 0, 300);
    builder.insert(&mut tree, &[a, b, rf("app", 0xd)], 1, 700);
    tree
}

#[test]
fn self_hotspots_rank_leaves_first() {
    let tree = two_rank_tree();
    let hotspots = HotspotAnalyzer::find_self_hotspots(&tree, 2);
    assert_eq!(hotspots.len(), 2);
    assert_eq!(hotspots[0].location, "app+0xd");
    assert_eq!(hotspots[0].self_count, 700);
    assert_eq!(hotspots[0].self_percentage, 70.0);
    assert_eq!(hotspots[1].location, "app+0xc");
    assert_eq!(hotspots[1].self_count, 300);
}

#[test]
fn single_leaf_gets_all_the_self_time() {
    let builder = TreeBuilder::new();
    let mut tree = builder.new_tree();
    builder.insert(
        &mut tree,
        &[rf("app", 0x400000), rf("app", 0x400100), rf("app", 0x400200)],
        0,
        1000,
    );
    let hotspots = HotspotAnalyzer::find_self_hotspots(&tree, 1);
    assert_eq!(hotspots.len(), 1);
    assert_eq!(hotspots[0].location, "app+0x400200");
    assert_eq!(hotspots[0].self_percentage, 100.0);
    assert_eq!(hotspots[0].total_count, 1000);
}

#[test]
fn total_hotspots_rank_callers_first() {
    let tree = two_rank_tree();
    let hotspots = HotspotAnalyzer::find_total_hotspots(&tree, 4);
    assert_eq!(hotspots[0].location, "app+0xa");
    assert_eq!(hotspots[0].total_count, 1000);
    assert_eq!(hotspots[1].location, "app+0xb");
    // The two leaves follow, heaviest first.
    assert_eq!(hotspots[2].location, "app+0xd");
    assert_eq!(hotspots[3].location, "app+0xc");
}

#[test]
fn shorter_report_is_a_prefix_of_a_longer_one() {
    let tree = two_rank_tree();
    let two = HotspotAnalyzer::find_self_hotspots(&tree, 2);
    let four = HotspotAnalyzer::find_self_hotspots(&tree, 4);
    assert_eq!(two[..], four[..2]);
}

#[test]
fn oversized_n_returns_every_node_but_the_root() {
    let tree = two_rank_tree();
    let hotspots = HotspotAnalyzer::find_self_hotspots(&tree, 100);
    assert_eq!(hotspots.len(), tree.len() - 1);
}

#[test]
fn deterministic_tie_break_by_library_and_offset() {
    let builder = TreeBuilder::new();
    let mut tree = builder.new_tree();
    builder.insert(&mut tree, &[rf("zlib", 1)], 0, 10);
    builder.insert(&mut tree, &[rf("alib", 2)], 0, 10);
    builder.insert(&mut tree, &[rf("alib", 1)], 0, 10);
    let hotspots = HotspotAnalyzer::find_self_hotspots(&tree, 3);
    let order: Vec<&str> = hotspots.iter().map(|h| h.location.as_str()).collect();
    assert_eq!(order, vec!["alib+0x1", "alib+0x2", "zlib+0x1"]);
}

#[test]
fn balance_of_two_uneven_ranks() {
    let report = BalanceAnalyzer::analyze(&two_rank_tree());
    assert_eq!(report.mean, 500.0);
    assert_eq!(report.min, 300);
    assert_eq!(report.max, 700);
    assert_eq!(report.imbalance_factor, 0.8);
    assert_eq!(report.most_loaded_process, 1);
    assert_eq!(report.least_loaded_process, 0);
    assert_eq!(report.per_process, vec![(0, 300), (1, 700)]);
    assert_eq!(report.stddev, 200.0);
}

#[test]
fn balance_of_empty_tree_is_all_zero() {
    let tree = TreeBuilder::new().new_tree();
    let report = BalanceAnalyzer::analyze(&tree);
    assert_eq!(report.mean, 0.0);
    assert_eq!(report.imbalance_factor, 0.0);
    assert_eq!(report.most_loaded_process, -1);
    assert_eq!(report.least_loaded_process, -1);
    assert!(report.per_process.is_empty());
}

#[test]
fn balance_with_zero_sample_rank_avoids_division_by_zero() {
    let builder = TreeBuilder::new();
    let mut tree = builder.new_tree();
    builder.insert(&mut tree, &[], 0, 0);
    let report = BalanceAnalyzer::analyze(&tree);
    assert_eq!(report.mean, 0.0);
    assert_eq!(report.imbalance_factor, 0.0);
}

#[test]
fn balance_in_exclusive_mode_sums_leaf_counts() {
    let builder = TreeBuilder {
        count_mode: CountMode::Exclusive,
        ..TreeBuilder::new()
    };
    let mut tree = builder.new_tree();
    builder.insert(&mut tree, &[rf("app", 1), rf("app", 2)], 0, 300);
    builder.insert(&mut tree, &[rf("app", 1), rf("app", 3)], 1, 700);
    let report = BalanceAnalyzer::analyze(&tree);
    assert_eq!(report.per_process, vec![(0, 300), (1, 700)]);
    assert_eq!(report.imbalance_factor, 0.8);
}

#[test]
fn balanced_ranks_have_zero_imbalance() {
    let builder = TreeBuilder::new();
    let mut tree = builder.new_tree();
    builder.insert(&mut tree, &[rf("app", 1)], 0, 100);
    builder.insert(&mut tree, &[rf("app", 1)], 1, 100);
    let report = BalanceAnalyzer::analyze(&tree);
    assert_eq!(report.imbalance_factor, 0.0);
    assert_eq!(report.stddev, 0.0);
}

//! Placement search and tree compatibility.
//!
//! A floating event set (the implied events of a node from another tree) is
//! placed inside a reference tree at a node whose implied events contain it.
//! The reference root is the universal ancestor: anything can hang below it,
//! but events the root does not carry stay unexplained.

use generational_arena::Index;
use tracing::{debug, instrument, trace};

use crate::domain::arena::SubcloneTree;
use crate::domain::error::DomainError;
use crate::domain::event::{EventMatcher, SomaticEventPtr};
use crate::domain::event_set::{compare_by_size, contains, difference, EventSet};

/// All events implied by `node`: its own plus every ancestor's, root first.
#[instrument(level = "trace", skip(tree))]
pub fn node_events_list(tree: &SubcloneTree, node: Index) -> EventSet {
    let mut path: Vec<_> = tree.ancestors(node).map(|(_, n)| n).collect();
    path.reverse();
    path.into_iter()
        .flat_map(|n| n.data.events.iter().cloned())
        .collect()
}

/// Outcome of a placement search.
#[derive(Debug, Clone)]
pub struct Placement {
    pub placeable: bool,
    /// Input events not explained by the chosen node; empty is a perfect fit
    pub leftover: EventSet,
    /// Node the set was attached to, None when not placeable
    pub placed_at: Option<Index>,
    /// Children of the searched node that accepted the set (diagnostic only)
    pub placeable_children: usize,
    /// More than one branch accepted the set somewhere along the chosen path
    pub ambiguous: bool,
}

impl Placement {
    fn unplaceable(events: &[SomaticEventPtr]) -> Self {
        Self {
            placeable: false,
            leftover: events.to_vec(),
            placed_at: None,
            placeable_children: 0,
            ambiguous: false,
        }
    }

    fn at(node: Index, leftover: EventSet) -> Self {
        Self {
            placeable: true,
            leftover,
            placed_at: Some(node),
            placeable_children: 0,
            ambiguous: false,
        }
    }

    /// Placeable with nothing left unexplained.
    pub fn is_explained(&self) -> bool {
        self.placeable && self.leftover.is_empty()
    }
}

/// Decide where `events` can be embedded within the subtree rooted at `pnode`.
///
/// `events` must already include everything implied by the originating node.
/// Children are always searched since a descendant carries a superset of
/// `pnode`'s events. One accepting child wins outright; several are resolved
/// by the smallest leftover, first child on ties. Without an accepting child
/// the set sits at `pnode` if `pnode` contains it, or if `pnode` is the root.
#[instrument(level = "debug", skip(tree, events, matcher), fields(events = events.len()))]
pub fn check_placement<M: EventMatcher + ?Sized>(
    tree: &SubcloneTree,
    pnode: Index,
    events: &[SomaticEventPtr],
    matcher: &M,
) -> Placement {
    if tree.get_node(pnode).is_none() {
        return Placement::unplaceable(events);
    }
    if events.is_empty() {
        return Placement::at(pnode, EventSet::new());
    }
    let implied = node_events_list(tree, pnode);
    place(tree, pnode, implied, events, matcher, 0)
}

fn place<M: EventMatcher + ?Sized>(
    tree: &SubcloneTree,
    pnode: Index,
    implied: EventSet,
    events: &[SomaticEventPtr],
    matcher: &M,
    level: usize,
) -> Placement {
    let Some(node) = tree.get_node(pnode) else {
        return Placement::unplaceable(events);
    };
    let contained = contains(&implied, events, matcher);

    let mut accepted = Vec::new();
    // deeper than the node count means a corrupted child cycle
    if level < tree.len() {
        for &child in &node.children {
            let Some(child_node) = tree.get_node(child) else {
                continue;
            };
            let mut child_implied = implied.clone();
            child_implied.extend(child_node.data.events.iter().cloned());
            let result = place(tree, child, child_implied, events, matcher, level + 1);
            if result.placeable {
                accepted.push(result);
            }
        }
    }

    let placeable_children = accepted.len();
    trace!(
        node = %tree.node_name(pnode),
        contained,
        placeable_children,
        "placement step"
    );

    match select_best(accepted) {
        Some(mut best) => {
            best.ambiguous |= placeable_children > 1;
            best.placeable_children = placeable_children;
            best
        }
        None if contained || tree.is_root(pnode) => {
            Placement::at(pnode, difference(events, &implied, matcher))
        }
        None => Placement::unplaceable(events),
    }
}

/// Pick the result with the fewest leftover events; the earliest wins ties.
fn select_best(results: Vec<Placement>) -> Option<Placement> {
    results
        .into_iter()
        .min_by(|a, b| compare_by_size(&a.leftover, &b.leftover))
}

fn tree_label(tree: &SubcloneTree) -> String {
    tree.name.clone().unwrap_or_else(|| "<unnamed tree>".to_string())
}

/// Check whether `q` could have been derived from `p`.
///
/// Every node of `q` must be explained by some node of `p`. Incompatibility
/// is `Ok(false)`; an empty tree is an error.
#[instrument(level = "debug", skip_all, fields(p = ?p.name, q = ?q.name))]
pub fn tree_merge<M: EventMatcher + ?Sized>(
    p: &SubcloneTree,
    q: &SubcloneTree,
    matcher: &M,
) -> Result<bool, DomainError> {
    let p_root = p.root().ok_or_else(|| DomainError::EmptyTree(tree_label(p)))?;
    if q.root().is_none() {
        return Err(DomainError::EmptyTree(tree_label(q)));
    }

    for (idx, _) in q.iter() {
        let events = node_events_list(q, idx);
        let placement = check_placement(p, p_root, &events, matcher);
        if !placement.is_explained() {
            debug!(
                node = %q.node_name(idx),
                leftover = placement.leftover.len(),
                "node not explained by reference tree"
            );
            return Ok(false);
        }
    }
    Ok(true)
}

/// Per-node diagnostics of a merge.
#[derive(Debug, Clone)]
pub struct NodeVerdict {
    pub node: Index,
    pub name: String,
    /// Number of events implied by the node
    pub implied_events: usize,
    pub placement: Placement,
    /// Name of the reference node the set was attached to
    pub placed_at: Option<String>,
}

/// Full, non-short-circuiting merge result.
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub compatible: bool,
    pub nodes: Vec<NodeVerdict>,
}

impl MergeReport {
    pub fn unexplained(&self) -> impl Iterator<Item = &NodeVerdict> {
        self.nodes.iter().filter(|v| !v.placement.is_explained())
    }

    pub fn ambiguous(&self) -> impl Iterator<Item = &NodeVerdict> {
        self.nodes.iter().filter(|v| v.placement.ambiguous)
    }
}

/// Like [`tree_merge`] but evaluates every node of `q` and keeps diagnostics.
#[instrument(level = "debug", skip_all, fields(p = ?p.name, q = ?q.name))]
pub fn merge_report<M: EventMatcher + ?Sized>(
    p: &SubcloneTree,
    q: &SubcloneTree,
    matcher: &M,
) -> Result<MergeReport, DomainError> {
    let p_root = p.root().ok_or_else(|| DomainError::EmptyTree(tree_label(p)))?;
    if q.root().is_none() {
        return Err(DomainError::EmptyTree(tree_label(q)));
    }

    let nodes: Vec<NodeVerdict> = q
        .iter()
        .map(|(idx, _)| {
            let events = node_events_list(q, idx);
            let placement = check_placement(p, p_root, &events, matcher);
            NodeVerdict {
                node: idx,
                name: q.node_name(idx),
                implied_events: events.len(),
                placed_at: placement.placed_at.map(|at| p.node_name(at)),
                placement,
            }
        })
        .collect();
    let compatible = nodes.iter().all(|v| v.placement.is_explained());
    Ok(MergeReport { compatible, nodes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builder::TreeBuilder;
    use crate::domain::entities::{SubcloneOutline, TreeOutline};
    use crate::domain::event::{BoundaryMatcher, EventKind, SomaticEvent};
    use std::sync::Arc;

    fn snv(chrom: &str, pos: u64) -> SomaticEvent {
        SomaticEvent::point(EventKind::Snv, chrom, pos)
    }

    fn ptr(e: SomaticEvent) -> SomaticEventPtr {
        Arc::new(e)
    }

    fn build(root: SubcloneOutline) -> SubcloneTree {
        TreeBuilder::new()
            .build(&TreeOutline { name: None, root })
            .unwrap()
    }

    // root {} with C1 {A}, C2 {B}
    fn two_branches() -> SubcloneTree {
        build(
            SubcloneOutline::new("root")
                .with_child(SubcloneOutline::new("C1").with_events([snv("1", 1_000)]))
                .with_child(SubcloneOutline::new("C2").with_events([snv("2", 2_000)])),
        )
    }

    #[test]
    fn given_nested_node_when_listing_events_then_includes_ancestors_root_first() {
        let tree = build(
            SubcloneOutline::new("root")
                .with_events([snv("1", 1)])
                .with_child(
                    SubcloneOutline::new("a")
                        .with_events([snv("2", 2)])
                        .with_child(SubcloneOutline::new("b").with_events([snv("3", 3)])),
                ),
        );
        let b = tree.find("b").unwrap();
        let chroms: Vec<_> = node_events_list(&tree, b)
            .iter()
            .map(|e| e.chrom.clone())
            .collect();
        assert_eq!(chroms, vec!["1", "2", "3"]);
        assert_eq!(node_events_list(&tree, tree.root().unwrap()).len(), 1);
    }

    #[test]
    fn given_single_matching_child_when_placing_then_resolves_to_child() {
        let tree = two_branches();
        let m = BoundaryMatcher::default();
        let events = vec![ptr(snv("1", 1_000))];
        let placement = check_placement(&tree, tree.root().unwrap(), &events, &m);
        assert!(placement.placeable);
        assert!(placement.leftover.is_empty());
        assert_eq!(placement.placed_at, tree.find("C1"));
        assert_eq!(placement.placeable_children, 1);
        assert!(!placement.ambiguous);
    }

    #[test]
    fn given_events_split_over_siblings_when_placing_then_root_with_full_leftover() {
        let tree = two_branches();
        let m = BoundaryMatcher::default();
        let events = vec![ptr(snv("1", 1_000)), ptr(snv("2", 2_000))];
        let placement = check_placement(&tree, tree.root().unwrap(), &events, &m);
        assert!(placement.placeable);
        assert_eq!(placement.placed_at, tree.root());
        assert_eq!(placement.leftover.len(), 2);
        assert_eq!(placement.placeable_children, 0);
        assert!(!placement.is_explained());
    }

    #[test]
    fn given_non_root_leaf_without_containment_when_placing_then_not_placeable() {
        let tree = two_branches();
        let m = BoundaryMatcher::default();
        let c1 = tree.find("C1").unwrap();
        let events = vec![ptr(snv("9", 9))];
        let placement = check_placement(&tree, c1, &events, &m);
        assert!(!placement.placeable);
        assert_eq!(placement.placed_at, None);
        assert_eq!(placement.leftover.len(), 1);
    }

    #[test]
    fn given_empty_set_when_placing_then_trivially_placeable() {
        let tree = two_branches();
        let m = BoundaryMatcher::default();
        let c2 = tree.find("C2").unwrap();
        let placement = check_placement(&tree, c2, &[], &m);
        assert!(placement.is_explained());
        assert_eq!(placement.placed_at, Some(c2));
    }

    #[test]
    fn given_two_accepting_children_when_placing_then_first_child_and_ambiguous() {
        let tree = build(
            SubcloneOutline::new("root")
                .with_events([snv("1", 100)])
                .with_child(SubcloneOutline::new("left").with_events([snv("2", 200)]))
                .with_child(SubcloneOutline::new("right").with_events([snv("3", 300)])),
        );
        let m = BoundaryMatcher::default();
        let events = vec![ptr(snv("1", 100))];
        let placement = check_placement(&tree, tree.root().unwrap(), &events, &m);
        assert!(placement.is_explained());
        assert_eq!(placement.placeable_children, 2);
        assert!(placement.ambiguous);
        assert_eq!(placement.placed_at, tree.find("left"));
    }

    #[test]
    fn given_candidates_when_selecting_then_fewest_leftover_wins() {
        let idx = two_branches().root().unwrap();
        let big = Placement::at(idx, vec![ptr(snv("1", 1)), ptr(snv("2", 2))]);
        let small = Placement::at(idx, vec![ptr(snv("3", 3))]);
        let also_small = Placement::at(idx, vec![ptr(snv("4", 4))]);
        let best = select_best(vec![big, small, also_small]).unwrap();
        assert_eq!(best.leftover.len(), 1);
        assert_eq!(best.leftover[0].chrom, "3");
        assert!(select_best(Vec::new()).is_none());
    }

    #[test]
    fn given_placement_when_leftover_then_subset_of_input() {
        let tree = two_branches();
        let m = BoundaryMatcher::default();
        let events = vec![ptr(snv("1", 1_000)), ptr(snv("7", 7)), ptr(snv("2", 2_000))];
        let placement = check_placement(&tree, tree.root().unwrap(), &events, &m);
        for e in &placement.leftover {
            assert!(events.iter().any(|input| Arc::ptr_eq(input, e)));
        }
    }

    #[test]
    fn given_same_tree_when_merging_then_compatible() {
        let tree = build(
            SubcloneOutline::new("root")
                .with_events([snv("1", 10)])
                .with_child(
                    SubcloneOutline::new("a")
                        .with_events([snv("2", 20)])
                        .with_child(SubcloneOutline::new("a1").with_events([snv("5", 50)]))
                        .with_child(SubcloneOutline::new("a2").with_events([snv("6", 60)])),
                )
                .with_child(SubcloneOutline::new("b").with_events([snv("3", 30)])),
        );
        let m = BoundaryMatcher::default();
        assert!(tree_merge(&tree, &tree, &m).unwrap());
    }

    #[test]
    fn given_q_with_foreign_event_when_merging_then_incompatible() {
        let p = two_branches();
        let q = build(
            SubcloneOutline::new("root")
                .with_child(SubcloneOutline::new("C1").with_events([snv("1", 1_000)]))
                .with_child(SubcloneOutline::new("new").with_events([snv("12", 5)])),
        );
        let m = BoundaryMatcher::default();
        assert!(!tree_merge(&p, &q, &m).unwrap());
        let report = merge_report(&p, &q, &m).unwrap();
        assert!(!report.compatible);
        let unexplained: Vec<_> = report.unexplained().map(|v| v.name.clone()).collect();
        assert_eq!(unexplained, vec!["new"]);
    }

    #[test]
    fn given_shifted_breakpoints_within_resolution_when_merging_then_compatible() {
        let p = two_branches();
        let q = build(
            SubcloneOutline::new("root")
                .with_child(SubcloneOutline::new("C1'").with_events([snv("1", 15_000_000)])),
        );
        assert!(tree_merge(&p, &q, &BoundaryMatcher::default()).unwrap());
        assert!(!tree_merge(&p, &q, &BoundaryMatcher::new(1_000)).unwrap());
    }

    #[test]
    fn given_q_collapsing_branches_when_merging_then_incompatible() {
        // q puts A and B on one lineage, p keeps them on separate branches
        let p = two_branches();
        let q = build(
            SubcloneOutline::new("root").with_child(
                SubcloneOutline::new("A")
                    .with_events([snv("1", 1_000)])
                    .with_child(SubcloneOutline::new("AB").with_events([snv("2", 2_000)])),
            ),
        );
        let m = BoundaryMatcher::default();
        assert!(!tree_merge(&p, &q, &m).unwrap());
        assert!(tree_merge(&q, &q, &m).unwrap());
    }

    #[test]
    fn given_empty_tree_when_merging_then_error() {
        let p = two_branches();
        let empty = SubcloneTree::new();
        let m = BoundaryMatcher::default();
        assert!(matches!(tree_merge(&empty, &p, &m), Err(DomainError::EmptyTree(_))));
        assert!(matches!(tree_merge(&p, &empty, &m), Err(DomainError::EmptyTree(_))));
        assert!(merge_report(&p, &empty, &m).is_err());
    }

    #[test]
    fn given_report_when_compared_with_merge_then_same_verdict() {
        let p = two_branches();
        let q = build(
            SubcloneOutline::new("root")
                .with_child(SubcloneOutline::new("x").with_events([snv("2", 2_000)])),
        );
        let m = BoundaryMatcher::default();
        let report = merge_report(&p, &q, &m).unwrap();
        assert_eq!(report.compatible, tree_merge(&p, &q, &m).unwrap());
        assert_eq!(report.nodes.len(), q.len());
        let x = report.nodes.iter().find(|v| v.name == "x").unwrap();
        assert_eq!(x.placed_at.as_deref(), Some("C2"));
    }

    #[test]
    fn given_corrupted_child_cycle_when_placing_then_terminates() {
        let mut tree = two_branches();
        let root = tree.root().unwrap();
        let c1 = tree.find("C1").unwrap();
        tree.get_node_mut(c1).unwrap().children.push(root);
        let m = BoundaryMatcher::default();
        let events = vec![ptr(snv("8", 8))];
        let placement = check_placement(&tree, root, &events, &m);
        assert!(placement.placeable);
    }
}

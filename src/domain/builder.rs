//! Tree builder: turns nested outlines into arena trees and back.

use std::sync::Arc;

use generational_arena::Index;
use tracing::{debug, instrument};

use crate::domain::arena::{SubcloneData, SubcloneTree};
use crate::domain::entities::{SubcloneOutline, TreeOutline};
use crate::domain::error::DomainError;
use crate::domain::event::{BoundaryMatcher, EventMatcher};
use crate::domain::event_set::EventSet;
use crate::domain::placement::node_events_list;

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, DomainError>;

/// Constructs subclone trees and optionally checks structural invariants.
pub struct TreeBuilder {
    matcher: BoundaryMatcher,
    validate: bool,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            matcher: BoundaryMatcher::default(),
            validate: true,
        }
    }

    pub fn with_matcher(mut self, matcher: BoundaryMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Toggle sibling-disjointness and inheritance checks.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Build an arena tree from an outline.
    #[instrument(level = "debug", skip(self, outline), fields(name = ?outline.name))]
    pub fn build(&self, outline: &TreeOutline) -> TreeResult<SubcloneTree> {
        let mut tree = SubcloneTree::new();
        tree.name = outline.name.clone();
        let mut stack: Vec<(&SubcloneOutline, Option<Index>)> = vec![(&outline.root, None)];

        while let Some((current, parent_idx)) = stack.pop() {
            let mut events: EventSet = Vec::with_capacity(current.events.len());
            for event in &current.events {
                event.validate()?;
                events.push(Arc::new(event.clone()));
            }

            let data = SubcloneData {
                label: current.label.clone(),
                fraction: current.fraction,
                events,
                id: None,
            };
            let current_idx = tree.insert_node(data, parent_idx);

            // Reverse so that pops keep the outline's child order
            for child in current.children.iter().rev() {
                stack.push((child, Some(current_idx)));
            }
        }

        debug!(nodes = tree.len(), depth = tree.depth(), "built tree");
        if self.validate {
            self.validate_tree(&tree)?;
        }
        Ok(tree)
    }

    /// Check that siblings are disjoint and no node repeats an inherited event.
    #[instrument(level = "debug", skip(self, tree))]
    pub fn validate_tree(&self, tree: &SubcloneTree) -> TreeResult<()> {
        let root = tree
            .root()
            .ok_or_else(|| DomainError::EmptyTree(tree_label(tree)))?;
        if tree.ancestors(root).count() != 1 {
            return Err(DomainError::CycleDetected(tree.node_name(root)));
        }

        let mut visited = 0;
        for (idx, node) in tree.iter() {
            visited += 1;

            if let Some(parent) = node.parent {
                let inherited = node_events_list(tree, parent);
                for event in &node.data.events {
                    if inherited.iter().any(|e| self.matcher.same_event(e, event)) {
                        return Err(DomainError::InheritedEventRepeated {
                            node: tree.node_name(idx),
                            event: event.to_string(),
                        });
                    }
                }
            }

            for (i, &left) in node.children.iter().enumerate() {
                for &right in &node.children[i + 1..] {
                    self.check_siblings(tree, left, right)?;
                }
            }
        }

        if visited != tree.len() {
            return Err(DomainError::CycleDetected(tree_label(tree)));
        }
        Ok(())
    }

    fn check_siblings(&self, tree: &SubcloneTree, left: Index, right: Index) -> TreeResult<()> {
        let (Some(l), Some(r)) = (tree.get_node(left), tree.get_node(right)) else {
            return Ok(());
        };
        for a in &l.data.events {
            if r.data.events.iter().any(|b| self.matcher.same_event(a, b)) {
                return Err(DomainError::OverlappingSiblings {
                    left: tree.node_name(left),
                    right: tree.node_name(right),
                    event: a.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn tree_label(tree: &SubcloneTree) -> String {
    tree.name.clone().unwrap_or_else(|| "<unnamed tree>".to_string())
}

/// Convert an arena tree back into its nested outline.
pub fn outline(tree: &SubcloneTree) -> TreeResult<TreeOutline> {
    let root = tree
        .root()
        .ok_or_else(|| DomainError::EmptyTree(tree_label(tree)))?;
    Ok(TreeOutline {
        name: tree.name.clone(),
        root: outline_node(tree, root, 0)?,
    })
}

fn outline_node(tree: &SubcloneTree, idx: Index, level: usize) -> TreeResult<SubcloneOutline> {
    if level > tree.len() {
        return Err(DomainError::CycleDetected(tree.node_name(idx)));
    }
    let node = tree
        .get_node(idx)
        .ok_or_else(|| DomainError::NodeNotFound(format!("{idx:?}")))?;
    let children = node
        .children
        .iter()
        .map(|&child| outline_node(tree, child, level + 1))
        .collect::<TreeResult<Vec<_>>>()?;
    Ok(SubcloneOutline {
        label: node.data.label.clone(),
        fraction: node.data.fraction,
        events: node.data.events.iter().map(|e| e.as_ref().clone()).collect(),
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{EventKind, SomaticEvent};

    fn snv(chrom: &str, pos: u64) -> SomaticEvent {
        SomaticEvent::point(EventKind::Snv, chrom, pos)
    }

    fn sample_outline() -> TreeOutline {
        TreeOutline {
            name: Some("primary".to_string()),
            root: SubcloneOutline::new("root")
                .with_events([snv("1", 100)])
                .with_child(
                    SubcloneOutline::new("a")
                        .with_events([snv("2", 200)])
                        .with_child(SubcloneOutline::new("c").with_events([snv("4", 400)])),
                )
                .with_child(SubcloneOutline::new("b").with_events([snv("3", 300)])),
        }
    }

    #[test]
    fn given_outline_when_building_then_keeps_structure_and_order() {
        let tree = TreeBuilder::new().build(&sample_outline()).unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.name.as_deref(), Some("primary"));
        let root = tree.root().unwrap();
        let children: Vec<_> = tree
            .get_node(root)
            .unwrap()
            .children
            .iter()
            .map(|&c| tree.node_name(c))
            .collect();
        assert_eq!(children, vec!["a", "b"]);
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn given_tree_when_outlining_then_roundtrips() {
        let original = sample_outline();
        let tree = TreeBuilder::new().build(&original).unwrap();
        assert_eq!(outline(&tree).unwrap(), original);
    }

    #[test]
    fn given_overlapping_siblings_when_validating_then_error() {
        let outline = TreeOutline {
            name: None,
            root: SubcloneOutline::new("root")
                .with_child(SubcloneOutline::new("a").with_events([snv("1", 100)]))
                .with_child(SubcloneOutline::new("b").with_events([snv("1", 5_000)])),
        };
        let err = TreeBuilder::new().build(&outline).unwrap_err();
        assert!(matches!(err, DomainError::OverlappingSiblings { .. }));

        let lenient = TreeBuilder::new().with_validation(false).build(&outline);
        assert!(lenient.is_ok());
    }

    #[test]
    fn given_narrow_resolution_when_validating_siblings_then_distinct() {
        let outline = TreeOutline {
            name: None,
            root: SubcloneOutline::new("root")
                .with_child(SubcloneOutline::new("a").with_events([snv("1", 100)]))
                .with_child(SubcloneOutline::new("b").with_events([snv("1", 5_000)])),
        };
        let builder = TreeBuilder::new().with_matcher(BoundaryMatcher::new(10));
        assert!(builder.build(&outline).is_ok());
    }

    #[test]
    fn given_child_repeating_parent_event_when_validating_then_error() {
        let outline = TreeOutline {
            name: None,
            root: SubcloneOutline::new("root")
                .with_events([snv("1", 100)])
                .with_child(SubcloneOutline::new("a").with_events([snv("1", 150)])),
        };
        let err = TreeBuilder::new().build(&outline).unwrap_err();
        assert!(matches!(err, DomainError::InheritedEventRepeated { .. }));
    }

    #[test]
    fn given_invalid_event_when_building_then_error() {
        let outline = TreeOutline {
            name: None,
            root: SubcloneOutline::new("root")
                .with_events([SomaticEvent::range(EventKind::Cnv, "1", 10, 5)]),
        };
        assert!(matches!(
            TreeBuilder::new().with_validation(false).build(&outline),
            Err(DomainError::InvalidEvent { .. })
        ));
    }

    #[test]
    fn given_empty_tree_when_outlining_then_error() {
        assert!(matches!(
            outline(&SubcloneTree::new()),
            Err(DomainError::EmptyTree(_))
        ));
    }
}

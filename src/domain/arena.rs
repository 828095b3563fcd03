use generational_arena::{Arena, Index};
use std::fmt;
use tracing::instrument;

use crate::domain::event_set::EventSet;

/// Data payload for a subclone node.
#[derive(Debug, Clone, Default)]
pub struct SubcloneData {
    /// Human readable name, e.g. "founder" or "clone-2b"
    pub label: Option<String>,
    /// Fraction of tumor cells in this subclone
    pub fraction: Option<f64>,
    /// Events that first appear at this node (not inherited)
    pub events: EventSet,
    /// Database identifier, set once archived
    pub id: Option<i64>,
}

impl fmt::Display for SubcloneData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.label, self.id) {
            (Some(label), _) => write!(f, "{label}"),
            (None, Some(id)) => write!(f, "#{id}"),
            (None, None) => write!(f, "<unnamed>"),
        }
    }
}

/// One subclone in the arena.
#[derive(Debug)]
pub struct Subclone {
    pub data: SubcloneData,
    /// Index of parent node in the arena, None for the root
    pub parent: Option<Index>,
    /// Indices of child nodes in insertion order
    pub children: Vec<Index>,
}

/// Arena-based subclone tree.
///
/// Parent links are navigational only; the arena owns every node and
/// dropping the tree releases the whole structure.
#[derive(Debug)]
pub struct SubcloneTree {
    arena: Arena<Subclone>,
    root: Option<Index>,
    /// Optional tree name, carried through documents and the database
    pub name: Option<String>,
    /// Database identifier, set once archived
    pub id: Option<i64>,
}

impl Default for SubcloneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SubcloneTree {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
            name: None,
            id: None,
        }
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new()
        }
    }

    /// Insert a node below `parent`, or as the root when `parent` is None.
    ///
    /// A parent index that is not in the arena leaves the node detached.
    #[instrument(level = "trace", skip(self, data))]
    pub fn insert_node(&mut self, data: SubcloneData, parent: Option<Index>) -> Index {
        let node = Subclone {
            data,
            parent,
            children: Vec::new(),
        };
        let node_idx = self.arena.insert(node);

        if let Some(parent_idx) = parent {
            if let Some(parent) = self.arena.get_mut(parent_idx) {
                parent.children.push(node_idx);
            }
        } else {
            self.root = Some(node_idx);
        }

        node_idx
    }

    pub fn get_node(&self, idx: Index) -> Option<&Subclone> {
        self.arena.get(idx)
    }

    pub fn get_node_mut(&mut self, idx: Index) -> Option<&mut Subclone> {
        self.arena.get_mut(idx)
    }

    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn is_root(&self, idx: Index) -> bool {
        self.get_node(idx).is_some_and(|n| n.parent.is_none())
    }

    /// Pre-order, children left to right.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    /// Walk from `idx` up to the root, starting with `idx` itself.
    pub fn ancestors(&self, idx: Index) -> AncestorIterator<'_> {
        AncestorIterator {
            tree: self,
            next: Some(idx),
            remaining: self.len(),
        }
    }

    /// Number of levels, counting the root as level 1.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.iter()
            .map(|(idx, _)| self.ancestors(idx).count())
            .max()
            .unwrap_or(0)
    }

    /// Collects all leaf nodes (nodes with no children).
    #[instrument(level = "debug", skip(self))]
    pub fn leaf_nodes(&self) -> Vec<Index> {
        self.iter()
            .filter(|(_, node)| node.children.is_empty())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Display name of a node, falling back to its arena position.
    pub fn node_name(&self, idx: Index) -> String {
        match self.get_node(idx) {
            Some(node) if node.data.label.is_some() || node.data.id.is_some() => {
                node.data.to_string()
            }
            _ => format!("node-{}", idx.into_raw_parts().0),
        }
    }

    /// Find a node by label.
    pub fn find(&self, label: &str) -> Option<Index> {
        self.iter()
            .find(|(_, node)| node.data.label.as_deref() == Some(label))
            .map(|(idx, _)| idx)
    }

    /// Total number of local events over all nodes.
    pub fn event_count(&self) -> usize {
        self.iter().map(|(_, node)| node.data.events.len()).sum()
    }
}

pub struct TreeIterator<'a> {
    tree: &'a SubcloneTree,
    stack: Vec<Index>,
    remaining: usize,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a SubcloneTree) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = tree.root() {
            stack.push(root);
        }
        Self {
            tree,
            stack,
            remaining: tree.len(),
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a Subclone);

    fn next(&mut self) -> Option<Self::Item> {
        // A well-formed tree yields each node once; stop on corrupted links.
        while self.remaining > 0 {
            let current_idx = self.stack.pop()?;
            if let Some(node) = self.tree.get_node(current_idx) {
                self.remaining -= 1;
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}

/// Upward walk bounded by the arena size, so a corrupted parent chain ends.
pub struct AncestorIterator<'a> {
    tree: &'a SubcloneTree,
    next: Option<Index>,
    remaining: usize,
}

impl<'a> Iterator for AncestorIterator<'a> {
    type Item = (Index, &'a Subclone);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let idx = self.next?;
        let node = self.tree.get_node(idx)?;
        self.remaining -= 1;
        self.next = node.parent;
        Some((idx, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(label: &str) -> SubcloneData {
        SubcloneData {
            label: Some(label.to_string()),
            ..SubcloneData::default()
        }
    }

    //      root
    //      /  \
    //     a    b
    //     |
    //     c
    fn sample() -> (SubcloneTree, [Index; 4]) {
        let mut tree = SubcloneTree::new();
        let root = tree.insert_node(labeled("root"), None);
        let a = tree.insert_node(labeled("a"), Some(root));
        let b = tree.insert_node(labeled("b"), Some(root));
        let c = tree.insert_node(labeled("c"), Some(a));
        (tree, [root, a, b, c])
    }

    #[test]
    fn given_tree_when_iterating_then_preorder_left_to_right() {
        let (tree, _) = sample();
        let labels: Vec<_> = tree.iter().map(|(i, _)| tree.node_name(i)).collect();
        assert_eq!(labels, vec!["root", "a", "c", "b"]);
    }

    #[test]
    fn given_tree_when_depth_and_leaves_then_correct() {
        let (tree, [_, _, b, c]) = sample();
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.leaf_nodes(), vec![c, b]);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn given_leaf_when_walking_ancestors_then_reaches_root() {
        let (tree, [root, a, _, c]) = sample();
        let path: Vec<_> = tree.ancestors(c).map(|(i, _)| i).collect();
        assert_eq!(path, vec![c, a, root]);
        assert!(tree.is_root(root));
        assert!(!tree.is_root(c));
    }

    #[test]
    fn given_corrupted_parent_cycle_when_walking_ancestors_then_terminates() {
        let (mut tree, [root, a, _, _]) = sample();
        tree.get_node_mut(root).unwrap().parent = Some(a);
        assert!(tree.ancestors(a).count() <= tree.len());
    }

    #[test]
    fn given_corrupted_child_cycle_when_iterating_then_terminates() {
        let (mut tree, [root, _, _, c]) = sample();
        tree.get_node_mut(c).unwrap().children.push(root);
        assert!(tree.iter().count() <= tree.len());
    }

    #[test]
    fn given_empty_tree_when_querying_then_defaults() {
        let tree = SubcloneTree::new();
        assert!(tree.root().is_none());
        assert_eq!(tree.depth(), 0);
        assert!(tree.leaf_nodes().is_empty());
        assert_eq!(tree.iter().count(), 0);
    }

    #[test]
    fn given_label_when_find_then_returns_index() {
        let (tree, [_, _, b, _]) = sample();
        assert_eq!(tree.find("b"), Some(b));
        assert_eq!(tree.find("zzz"), None);
    }
}

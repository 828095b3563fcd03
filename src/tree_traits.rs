use generational_arena::Index;
use itertools::Itertools;
use termtree::Tree;
use tracing::instrument;

use crate::domain::{Subclone, SubcloneTree};

/// Render a tree as a terminal tree of strings.
pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

fn node_line(tree: &SubcloneTree, idx: Index, node: &Subclone) -> String {
    let mut line = tree.node_name(idx);
    if let Some(fraction) = node.data.fraction {
        line.push_str(&format!(" ({fraction})"));
    }
    if !node.data.events.is_empty() {
        line.push_str(&format!(" [{}]", node.data.events.iter().join(", ")));
    }
    line
}

impl TreeNodeConvert for SubcloneTree {
    #[instrument(level = "debug", skip(self), fields(name = ?self.name))]
    fn to_tree_string(&self) -> Tree<String> {
        let Some(root_idx) = self.root() else {
            return Tree::new("Empty tree".to_string());
        };
        let Some(root) = self.get_node(root_idx) else {
            return Tree::new("Empty tree".to_string());
        };

        fn build_tree(
            tree: &SubcloneTree,
            node: &Subclone,
            parent_tree: &mut Tree<String>,
            level: usize,
        ) {
            // Corrupted child links must not recurse forever
            if level >= tree.len() {
                return;
            }
            for &child_idx in &node.children {
                if let Some(child) = tree.get_node(child_idx) {
                    let mut child_tree = Tree::new(node_line(tree, child_idx, child));
                    build_tree(tree, child, &mut child_tree, level + 1);
                    parent_tree.push(child_tree);
                }
            }
        }

        let mut rendered = Tree::new(node_line(self, root_idx, root));
        build_tree(self, root, &mut rendered, 0);
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventKind, SomaticEvent, SubcloneOutline, TreeBuilder, TreeOutline};

    #[test]
    fn given_tree_when_rendering_then_nested_lines_with_events() {
        let outline = TreeOutline {
            name: None,
            root: SubcloneOutline::new("root")
                .with_events([SomaticEvent::point(EventKind::Snv, "1", 100)])
                .with_child(SubcloneOutline::new("a").with_fraction(0.25)),
        };
        let tree = TreeBuilder::new().build(&outline).unwrap();
        let rendered = tree.to_tree_string().to_string();
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "root [snv:1:100]");
        assert!(lines[1].ends_with("a (0.25)"));
    }

    #[test]
    fn given_empty_tree_when_rendering_then_placeholder() {
        assert_eq!(
            SubcloneTree::new().to_tree_string().to_string().trim(),
            "Empty tree"
        );
    }
}

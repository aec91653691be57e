#![forbid(unsafe_code)]

//! NodeSet type for document-subset canonicalization.
//!
//! A `NodeSet` represents a set of nodes from a parsed document,
//! identified by `NodeId`.  The EBICS authentication signature covers
//! the union of every `authenticate="true"` subtree, so the only
//! constructors needed are subtree collection and union.

use std::collections::HashSet;

/// A set of XML document nodes identified by `roxmltree::NodeId`.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: HashSet<usize>,
}

impl NodeSet {
    /// Create an empty node set.
    pub fn new() -> Self {
        Self { nodes: HashSet::new() }
    }

    /// Create a node set for a subtree rooted at the given node,
    /// excluding comment nodes.
    pub fn tree_without_comments(root: roxmltree::Node<'_, '_>) -> Self {
        let mut set = Self::new();
        set.add_subtree(root);
        set
    }

    /// Add a subtree (descendant-or-self, minus comments) to this set.
    pub fn add_subtree(&mut self, root: roxmltree::Node<'_, '_>) {
        for node in root.descendants() {
            if node.node_type() != roxmltree::NodeType::Comment {
                self.nodes.insert(node.id().get_usize());
            }
        }
    }

    /// Compute the union of two node sets.
    pub fn union(&self, other: &NodeSet) -> NodeSet {
        NodeSet {
            nodes: self.nodes.union(&other.nodes).copied().collect(),
        }
    }

    /// Check if a node is in this set.
    pub fn contains(&self, node: &roxmltree::Node<'_, '_>) -> bool {
        self.nodes.contains(&node.id().get_usize())
    }

    /// Check if this set is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes in the set.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

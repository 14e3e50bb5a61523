//! Immutable compiled trie nodes

use crate::matcher::{CommandId, NodeMatcher};
use crate::tag::TagRequirement;

/// A command completing at a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    pub id: CommandId,
    /// Full requirement of the command; checked on acceptance
    pub requirement: TagRequirement,
}

/// Compiled trie node.
///
/// Children are stored sorted: non-leaves before leaves, then by ascending
/// matcher weight. Traversal relies on that order.
#[derive(Debug)]
pub struct Node {
    pub(crate) matcher: NodeMatcher,
    pub(crate) children: Vec<Node>,
    pub(crate) requirements: Vec<TagRequirement>,
    pub(crate) terminals: Vec<Terminal>,
}

impl Node {
    pub fn matcher(&self) -> &NodeMatcher {
        &self.matcher
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Requirements gating entry into this subtree
    pub fn requirements(&self) -> &[TagRequirement] {
        &self.requirements
    }

    /// Commands completing here, in registration order
    pub fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    /// At least one command completes here
    pub fn is_leaf(&self) -> bool {
        !self.terminals.is_empty()
    }

    pub fn weight(&self) -> u32 {
        self.matcher.weight()
    }

    /// Number of nodes in this subtree, self included
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Node::size).sum::<usize>()
    }
}

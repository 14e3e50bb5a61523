//! Construction-time trie assembly
//!
//! Matcher chains of every registered command are folded into one mutable
//! [`NodeBuilder`] tree, sharing nodes whose matchers are structurally
//! equivalent. [`NodeBuilder::build`] then freezes the tree, sorting every
//! child list into traversal order.

use tracing::debug;

use super::node::{Node, Terminal};
use super::Trie;
use crate::compiler::CompiledCommand;
use crate::error::{EngineError, Result};
use crate::matcher::NodeMatcher;
use crate::tag::{TagPolicy, TagRequirement};

/// Mutable node used only while a trie is being assembled
#[derive(Debug, Default)]
pub struct NodeBuilder {
    matcher: Option<NodeMatcher>,
    children: Vec<NodeBuilder>,
    requirements: Vec<TagRequirement>,
    terminals: Vec<Terminal>,
}

impl NodeBuilder {
    /// Builder with no matcher yet; must be assigned before `build`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matcher(matcher: NodeMatcher) -> Self {
        Self {
            matcher: Some(matcher),
            ..Self::default()
        }
    }

    pub fn set_matcher(&mut self, matcher: NodeMatcher) {
        self.matcher = Some(matcher);
    }

    /// Append a requirement unless an equal one is already attached
    pub fn add_requirement(&mut self, requirement: TagRequirement) {
        if !self.requirements.contains(&requirement) {
            self.requirements.push(requirement);
        }
    }

    pub fn add_terminal(&mut self, terminal: Terminal) {
        if !self.terminals.contains(&terminal) {
            self.terminals.push(terminal);
        }
    }

    pub fn add_child(&mut self, child: NodeBuilder) {
        self.children.push(child);
    }

    /// Existing child with an equivalent matcher, or a new one
    pub fn child_for(&mut self, matcher: &NodeMatcher) -> &mut NodeBuilder {
        let existing = self
            .children
            .iter()
            .position(|c| c.matcher.as_ref().is_some_and(|m| m.same_as(matcher)));
        let index = match existing {
            Some(index) => index,
            None => {
                self.children.push(NodeBuilder::with_matcher(matcher.clone()));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Freeze this subtree. Fails if any node never had its matcher assigned.
    pub fn build(self) -> Result<Node> {
        self.build_at(0)
    }

    fn build_at(self, depth: usize) -> Result<Node> {
        let matcher = self.matcher.ok_or(EngineError::UnassignedMatcher { depth })?;
        let mut children = self
            .children
            .into_iter()
            .map(|c| c.build_at(depth + 1))
            .collect::<Result<Vec<_>>>()?;
        // stable: equal keys keep insertion order
        children.sort_by_key(|c| (c.is_leaf(), c.weight()));

        Ok(Node {
            matcher,
            children,
            requirements: self.requirements,
            terminals: self.terminals,
        })
    }
}

/// Folds compiled commands into one shared trie
#[derive(Debug)]
pub struct TrieBuilder {
    root: NodeBuilder,
    policy: TagPolicy,
    commands: usize,
}

impl TrieBuilder {
    pub fn new(policy: TagPolicy) -> Self {
        Self {
            root: NodeBuilder::with_matcher(NodeMatcher::Root),
            policy,
            commands: 0,
        }
    }

    pub fn insert(&mut self, command: &CompiledCommand) {
        let mut node = &mut self.root;
        for step in &command.steps {
            node = node.child_for(&step.matcher);
            node.add_requirement(step.requirement.clone());
        }
        node.add_terminal(Terminal {
            id: command.id.clone(),
            requirement: command.requirement(),
        });
        self.commands += 1;
    }

    pub fn len(&self) -> usize {
        self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands == 0
    }

    pub fn build(self) -> Result<Trie> {
        let root = self.root.build()?;
        debug!(commands = self.commands, nodes = root.size(), "built trie");
        Ok(Trie {
            root,
            policy: self.policy,
            commands: self.commands,
        })
    }
}

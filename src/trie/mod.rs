//! Compiled command trie and the matching engine
//!
//! Traversal is a depth-first, backtracking, greedy longest-match search:
//!
//! 1. Run the node's matcher on the token window. Failure fails the path.
//! 2. Try children in their stored order (non-leaves first, leaves by ascending
//!    weight), skipping any whose tag requirements the active tags do not admit.
//!    The first child whose subtree matches wins; a failure deep in one subtree
//!    falls back to the next sibling.
//! 3. If no child matched and a command completes here (with its own tags
//!    satisfied), accept with whatever tokens remain.
//!
//! Because the accumulator is persistent, each sibling attempt starts from the
//! exact state its parent produced.

mod builder;
mod node;

pub use builder::{NodeBuilder, TrieBuilder};
pub use node::{Node, Terminal};

use std::fmt;

use crate::matcher::{MatchState, ParsedCommand};
use crate::tag::{ActiveTags, TagPolicy};
use crate::token::Token;

/// A successful traversal
#[derive(Debug, Clone, PartialEq)]
pub struct TrieMatch<'a> {
    pub command: ParsedCommand,
    /// Tokens after the matched command, for downstream handling
    pub remaining: &'a [Token],
}

/// Immutable trie shared by all readers until a rebuild supersedes it
#[derive(Debug)]
pub struct Trie {
    root: Node,
    policy: TagPolicy,
    commands: usize,
}

impl Trie {
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn policy(&self) -> TagPolicy {
        self.policy
    }

    /// Number of commands folded into this trie
    pub fn command_count(&self) -> usize {
        self.commands
    }

    /// Match the head of `tokens`. `None` means no registered command matched.
    pub fn try_traverse<'a>(
        &self,
        tokens: &'a [Token],
        active: &ActiveTags,
    ) -> Option<TrieMatch<'a>> {
        self.visit(&self.root, tokens, &MatchState::new(), active)
    }

    fn visit<'a>(
        &self,
        node: &Node,
        tokens: &'a [Token],
        state: &MatchState,
        active: &ActiveTags,
    ) -> Option<TrieMatch<'a>> {
        let (state, rest) = node.matcher.try_match(tokens, state)?;

        let deeper = node
            .children
            .iter()
            .filter(|child| self.policy.admits(&child.requirements, active))
            .find_map(|child| self.visit(child, rest, &state, active));
        if deeper.is_some() {
            return deeper;
        }

        let terminal = node
            .terminals
            .iter()
            .find(|t| t.requirement.is_satisfied(active))?;
        Some(TrieMatch {
            command: state.finish(terminal.id.clone()),
            remaining: rest,
        })
    }
}

impl fmt::Display for Trie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn walk(node: &Node, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:indent$}{} (w{})", "", node.matcher, node.weight(), indent = depth * 2)?;
            let gated: Vec<String> = node
                .requirements
                .iter()
                .filter(|r| !r.is_empty())
                .map(|r| r.to_string())
                .collect();
            if !gated.is_empty() {
                write!(f, " tags {}", gated.join(" | "))?;
            }
            for terminal in &node.terminals {
                write!(f, " => {}", terminal.id)?;
            }
            writeln!(f)?;
            node.children.iter().try_for_each(|c| walk(c, depth + 1, f))
        }
        walk(&self.root, 0, f)
    }
}

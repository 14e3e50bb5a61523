//! Shared runtime state - centralized, thread-safe state accessible from all components
//!
//! Holds the active tag snapshot consulted on every traversal and the
//! session lifecycle flag. Tags are republished as a whole with a pointer swap
//! so the matching path never locks.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::Config;
use crate::tag::{ActiveTags, Tag};

pub struct RuntimeState {
    /// Tags describing the current environment
    active_tags: ArcSwap<ActiveTags>,
    /// Session keeps running while set
    running: AtomicBool,
    /// Commands executed successfully
    pub executed: AtomicU64,
    /// Commands that failed or were no longer available
    pub failed: AtomicU64,
}

pub type SharedState = Arc<RuntimeState>;

impl RuntimeState {
    /// Create new RuntimeState initialized from config
    pub fn new(config: &Config) -> SharedState {
        Self::with_tags(ActiveTags::from_names(&config.active_tags))
    }

    pub fn with_tags(tags: ActiveTags) -> SharedState {
        Arc::new(Self {
            active_tags: ArcSwap::from_pointee(tags),
            running: AtomicBool::new(true),
            executed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        })
    }

    /// Snapshot of the active tags
    pub fn tags(&self) -> Arc<ActiveTags> {
        self.active_tags.load_full()
    }

    /// Turn a tag on or off, returns whether the set changed
    pub fn set_tag(&self, name: &str, on: bool) -> bool {
        let tag = Tag::lookup(name);
        let mut changed = false;
        self.active_tags.rcu(|current| {
            let mut next = ActiveTags::clone(current);
            changed = if on { next.insert(tag.clone()) } else { next.remove(&tag) };
            next
        });
        changed
    }

    /// Toggle a tag, returns the new state
    pub fn toggle_tag(&self, name: &str) -> bool {
        let tag = Tag::lookup(name);
        let mut now_on = false;
        self.active_tags.rcu(|current| {
            let mut next = ActiveTags::clone(current);
            now_on = if next.contains(&tag) {
                next.remove(&tag);
                false
            } else {
                next.insert(tag.clone());
                true
            };
            next
        });
        now_on
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Sorted tag names, for status output
    pub fn tag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tags().iter().map(|t| t.to_string()).collect();
        names.sort();
        names
    }
}

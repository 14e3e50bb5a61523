//! Environment tags and the requirements that gate trie paths
//!
//! A [`Tag`] names an environmental context ("ide", "browser"). Tags are
//! interned so equal names share one allocation. A [`TagRequirement`] is an
//! order-insensitive set of tags that must all be active.

use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex};

/// Names interned by [`Tag::new`]. Entries are never evicted, so only
/// configured and registered tag names go through it.
static INTERNER: LazyLock<Mutex<HashSet<Arc<str>>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

/// Interned tag name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(Arc<str>);

impl Tag {
    pub fn new(name: &str) -> Self {
        let mut interned = INTERNER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = interned.get(name) {
            return Tag(Arc::clone(existing));
        }
        let name: Arc<str> = Arc::from(name);
        interned.insert(Arc::clone(&name));
        Tag(name)
    }

    /// Shares the interned name when one exists, otherwise allocates without
    /// interning. Use for names arriving at runtime, such as spoken captures.
    pub fn lookup(name: &str) -> Self {
        let interned = INTERNER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match interned.get(name) {
            Some(existing) => Tag(Arc::clone(existing)),
            None => Tag(Arc::from(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Tag::new(name)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of tags active at the moment of a traversal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveTags(HashSet<Tag>);

impl ActiveTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(names.into_iter().map(|n| Tag::new(n.as_ref())).collect())
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.0.contains(tag)
    }

    pub fn insert(&mut self, tag: Tag) -> bool {
        self.0.insert(tag)
    }

    pub fn remove(&mut self, tag: &Tag) -> bool {
        self.0.remove(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }
}

/// Immutable, order-insensitive set of tags that must all be active
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagRequirement(BTreeSet<Tag>);

impl TagRequirement {
    /// The requirement with zero tags, satisfied by any active set
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(names.into_iter().map(|n| Tag::new(n.as_ref())).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    /// Subset test: every required tag is active
    pub fn is_satisfied(&self, active: &ActiveTags) -> bool {
        self.0.iter().all(|tag| active.contains(tag))
    }

    /// Requirement holding the tags of both
    pub fn union(&self, other: &TagRequirement) -> TagRequirement {
        TagRequirement(self.0.union(&other.0).cloned().collect())
    }
}

impl fmt::Display for TagRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Tag::as_str).collect();
        write!(f, "{{{}}}", names.join(","))
    }
}

/// How several requirements attached to one trie node combine
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TagPolicy {
    /// Any one satisfied requirement admits entry
    #[default]
    Any,
    /// Every requirement must be satisfied
    All,
}

impl TagPolicy {
    /// Whether a node carrying `requirements` may be entered. No requirements always admits.
    pub fn admits(self, requirements: &[TagRequirement], active: &ActiveTags) -> bool {
        if requirements.is_empty() {
            return true;
        }
        match self {
            TagPolicy::Any => requirements.iter().any(|r| r.is_satisfied(active)),
            TagPolicy::All => requirements.iter().all(|r| r.is_satisfied(active)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_shares_allocation() {
        let a = Tag::new("ide");
        let b = Tag::from("ide");
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn test_lookup_does_not_grow_interner() {
        let known = Tag::new("browser");
        let found = Tag::lookup("browser");
        assert!(Arc::ptr_eq(&known.0, &found.0));

        let spoken = Tag::lookup("xylophone-never-configured");
        assert_eq!(spoken.as_str(), "xylophone-never-configured");
        let interned = INTERNER.lock().unwrap();
        assert!(!interned.contains("xylophone-never-configured"));
    }

    #[test]
    fn test_lookup_equals_interned_tag() {
        let active = ActiveTags::from_names(["media"]);
        assert!(active.contains(&Tag::lookup("media")));
        let mut runtime = ActiveTags::new();
        runtime.insert(Tag::lookup("media"));
        assert!(TagRequirement::from_names(["media"]).is_satisfied(&runtime));
    }

    #[test]
    fn test_empty_requirement_always_satisfied() {
        let empty = TagRequirement::empty();
        assert!(empty.is_satisfied(&ActiveTags::new()));
        assert!(empty.is_satisfied(&ActiveTags::from_names(["ide", "browser"])));
    }

    #[test]
    fn test_subset_semantics() {
        let req = TagRequirement::from_names(["ide", "rust"]);
        assert!(!req.is_satisfied(&ActiveTags::new()));
        assert!(!req.is_satisfied(&ActiveTags::from_names(["ide"])));
        assert!(req.is_satisfied(&ActiveTags::from_names(["rust", "ide"])));
        assert!(req.is_satisfied(&ActiveTags::from_names(["rust", "ide", "browser"])));
    }

    #[test]
    fn test_order_independent_equality() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let a = TagRequirement::from_names(["b", "a"]);
        let b = TagRequirement::from_names(["a", "b", "a"]);
        assert_eq!(a, b);

        let hash = |r: &TagRequirement| {
            let mut h = DefaultHasher::new();
            r.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&a), hash(&b));
        assert_eq!(a.to_string(), "{a,b}");
    }

    #[test]
    fn test_union() {
        let a = TagRequirement::from_names(["ide"]);
        let b = TagRequirement::from_names(["rust"]);
        assert_eq!(a.union(&b), TagRequirement::from_names(["rust", "ide"]));
        assert_eq!(a.union(&TagRequirement::empty()), a);
    }

    #[test]
    fn test_policies() {
        let reqs = vec![TagRequirement::from_names(["ide"]), TagRequirement::empty()];
        let none = ActiveTags::new();
        let ide = ActiveTags::from_names(["ide"]);

        assert!(TagPolicy::Any.admits(&reqs, &none));
        assert!(!TagPolicy::All.admits(&reqs, &none));
        assert!(TagPolicy::All.admits(&reqs, &ide));
        assert!(TagPolicy::Any.admits(&[], &none));
        assert!(TagPolicy::All.admits(&[], &none));
    }
}

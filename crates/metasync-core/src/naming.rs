//! Collision-free names for entities copied into a populated namespace
//!
//! The two systems may scope name uniqueness differently, so a copy is
//! checked against the siblings already present on the side being written.
//! A colliding name gets a ` (<n>)` suffix one past the highest suffix
//! already in use for that name. When that would overflow, the lowest
//! unused suffix is taken instead.

use std::collections::BTreeSet;

/// An existing entity in the namespace being written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sibling {
    pub key: String,
    pub name: String,
}

impl Sibling {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }
}

/// Computes unique names within one namespace
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueNameResolver;

impl UniqueNameResolver {
    /// Resolve a name for a new entity
    pub fn resolve(candidate: &str, siblings: &[Sibling]) -> String {
        Self::resolve_excluding(candidate, siblings, None)
    }

    /// Resolve a name for an entity being renamed
    ///
    /// `own_key` is the entity's current key in the namespace; its current
    /// name never counts as a collision, so an entity cannot collide with
    /// its own prior copy.
    pub fn resolve_rename(candidate: &str, siblings: &[Sibling], own_key: &str) -> String {
        Self::resolve_excluding(candidate, siblings, Some(own_key))
    }

    fn resolve_excluding(candidate: &str, siblings: &[Sibling], exclude: Option<&str>) -> String {
        let others = || {
            siblings
                .iter()
                .filter(move |s| exclude != Some(s.key.as_str()))
        };

        if !others().any(|s| s.name == candidate) {
            return candidate.to_string();
        }

        // The exact duplicate counts as one collision
        let used: BTreeSet<u64> = others()
            .filter_map(|s| suffix_of(&s.name, candidate))
            .collect();
        let highest = used.last().copied().unwrap_or(0);
        let next = highest
            .checked_add(1)
            .unwrap_or_else(|| lowest_unused(&used));

        format!("{} ({})", candidate, next)
    }
}

fn lowest_unused(used: &BTreeSet<u64>) -> u64 {
    let mut n = 1;
    while used.contains(&n) {
        n += 1;
    }
    n
}

/// `n` when `name` is exactly `candidate (n)`
fn suffix_of(name: &str, candidate: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(candidate)?
        .strip_prefix(" (")?
        .strip_suffix(')')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

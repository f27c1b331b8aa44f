//! Sync scopes: the entity trees reconciled together in one sweep

use serde::{Deserialize, Serialize};

use crate::translate::TypeHint;
use metasync_model::{Direction, Side};

/// One level of a scope tree
///
/// The root level is enumerated by type. Child levels are reached from their
/// parent through a named relationship on each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeLevel {
    pub source_type: String,
    pub destination_type: String,
    /// Relationship from the parent on the source side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_relationship: Option<String>,
    /// Relationship from the parent on the destination side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ScopeLevel>,
}

impl ScopeLevel {
    /// A root level enumerated by type
    pub fn root(source_type: impl Into<String>, destination_type: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            destination_type: destination_type.into(),
            source_relationship: None,
            destination_relationship: None,
            children: Vec::new(),
        }
    }

    /// A child level reached through a relationship on each side
    pub fn child(
        source_type: impl Into<String>,
        destination_type: impl Into<String>,
        source_relationship: impl Into<String>,
        destination_relationship: impl Into<String>,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            destination_type: destination_type.into(),
            source_relationship: Some(source_relationship.into()),
            destination_relationship: Some(destination_relationship.into()),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: ScopeLevel) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_root(&self) -> bool {
        self.source_relationship.is_none() && self.destination_relationship.is_none()
    }

    pub fn type_on(&self, side: Side) -> &str {
        match side {
            Side::Source => &self.source_type,
            Side::Destination => &self.destination_type,
        }
    }

    pub fn relationship(&self, side: Side) -> Option<&str> {
        match side {
            Side::Source => self.source_relationship.as_deref(),
            Side::Destination => self.destination_relationship.as_deref(),
        }
    }

    pub fn type_hint(&self) -> TypeHint<'_> {
        TypeHint::new(&self.source_type, &self.destination_type)
    }

    /// Depth-first search for the level holding `type_name` on `side`
    pub fn find(&self, side: Side, type_name: &str) -> Option<&ScopeLevel> {
        if self.type_on(side) == type_name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(side, type_name))
    }

    /// Number of levels in this subtree, itself included
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(ScopeLevel::depth).max().unwrap_or(0)
    }
}

/// A scope as written in the `[[scopes]]` configuration table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDefinition {
    pub name: String,
    /// Entity category, used to pick the direction policy
    pub category: String,
    pub source_type: String,
    pub destination_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ScopeLevel>,
}

impl ScopeDefinition {
    pub fn root_level(&self) -> ScopeLevel {
        ScopeLevel {
            source_type: self.source_type.clone(),
            destination_type: self.destination_type.clone(),
            source_relationship: None,
            destination_relationship: None,
            children: self.children.clone(),
        }
    }
}

/// A resolved scope, ready to sweep
///
/// Passed explicitly through the sweep instead of any per-run global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncScope {
    pub name: String,
    pub category: String,
    pub direction: Direction,
    /// When set, only the top-level entity with this name is swept
    pub qualifier: Option<String>,
    pub root: ScopeLevel,
}

impl SyncScope {
    pub fn new(name: impl Into<String>, category: impl Into<String>, root: ScopeLevel) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            direction: Direction::default(),
            qualifier: None,
            root,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn level_for_type(&self, side: Side, type_name: &str) -> Option<&ScopeLevel> {
        self.root.find(side, type_name)
    }
}

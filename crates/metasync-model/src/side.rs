//! Which metadata system an entity lives in, and which way data may flow

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two paired metadata systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The external technology's own metadata repository
    Source,
    /// The federated open-metadata store
    Destination,
}

impl Side {
    /// The other system
    pub fn opposite(self) -> Self {
        match self {
            Side::Source => Side::Destination,
            Side::Destination => Side::Source,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Destination => write!(f, "destination"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source" => Ok(Side::Source),
            "destination" => Ok(Side::Destination),
            other => Err(format!("unknown side '{}'", other)),
        }
    }
}

/// Direction policy for an entity category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    SourceToDestination,
    DestinationToSource,
    Both,
}

impl Direction {
    /// Whether content may be written into `target`
    pub fn allows_writes_to(self, target: Side) -> bool {
        match (self, target) {
            (Direction::Both, _) => true,
            (Direction::SourceToDestination, Side::Destination) => true,
            (Direction::DestinationToSource, Side::Source) => true,
            _ => false,
        }
    }

    /// Whether entities originating on `origin` are copied to the other side
    pub fn copies_from(self, origin: Side) -> bool {
        self.allows_writes_to(origin.opposite())
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::SourceToDestination => write!(f, "source_to_destination"),
            Direction::DestinationToSource => write!(f, "destination_to_source"),
            Direction::Both => write!(f, "both"),
        }
    }
}

//! Closed enumerations for organism kinds and founder archetypes.
//!
//! Both enums resolve to stable indices at construction time; string names are only used at
//! serialization boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trophic role of an organism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Prey,
    Predator,
}

impl Kind {
    /// All kinds in index order.
    pub const ALL: [Kind; 2] = [Kind::Prey, Kind::Predator];

    /// Stable dense index.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Prey => 0,
            Self::Predator => 1,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Prey => "prey",
            Self::Predator => "predator",
        }
    }

    /// Archetype that founds lineages of this kind.
    #[must_use]
    pub const fn founder(self) -> Archetype {
        match self {
            Self::Prey => Archetype::Grazer,
            Self::Predator => Archetype::Hunter,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Founder template an organism lineage descends from. Hall-of-fame archives are partitioned by
/// this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Grazer,
    Hunter,
}

impl Archetype {
    /// All archetypes in index order.
    pub const ALL: [Archetype; 2] = [Archetype::Grazer, Archetype::Hunter];
    /// Number of archetypes.
    pub const COUNT: usize = Self::ALL.len();

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Grazer => 0,
            Self::Hunter => 1,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Grazer),
            1 => Some(Self::Hunter),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Grazer => "grazer",
            Self::Hunter => "hunter",
        }
    }

    /// Resolve a serialized archetype name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|archetype| archetype.name() == name)
    }

    #[must_use]
    pub const fn kind(self) -> Kind {
        match self {
            Self::Grazer => Kind::Prey,
            Self::Hunter => Kind::Predator,
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

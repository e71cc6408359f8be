//! Stable particle handle identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one reusable particle handle inside the resource pool.
///
/// The id is the handle's slab position: handles are reused indefinitely,
/// so the position is a stable identity for the lifetime of the pool.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticleId(pub u32);

impl ParticleId {
    /// Create a ParticleId from a raw slab position
    pub fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw slab position
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// The slab position as an index
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticleId({})", self.0)
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

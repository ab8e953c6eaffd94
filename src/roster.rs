// src/roster.rs

use std::fmt;

use serde::{Deserialize, Serialize};

pub type NodeId = u64;

/// One validator of the permissioned fleet as declared at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: NodeId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterError {
    Empty,
    UnknownNode(NodeId),
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterError::Empty => write!(f, "roster has no validators"),
            RosterError::UnknownNode(id) => write!(f, "node {id} is not in the roster"),
        }
    }
}

impl std::error::Error for RosterError {}

/// What the scheduler needs to know about the fleet: how many validators
/// there are and where this node sits in their ordering. Queried once at
/// startup; validator-set churn is an orchestration concern above this core.
pub trait ValidatorRoster {
    /// Validator cardinality N. Always > 0 for a constructed roster.
    fn nodes_count(&self) -> u64;

    /// This node's zero-based position within the fleet ordering.
    fn my_position(&self) -> u64;
}

/// The fleet frozen at genesis, in the ordering every node derives.
#[derive(Debug, Clone)]
pub struct StaticRoster {
    entries: Vec<NodeEntry>, // sorted by id for determinism
    my_index: usize,
}

impl StaticRoster {
    /// Build the deterministic fleet ordering from the genesis entries.
    /// - Entries are **sorted by id** and deduplicated by id.
    /// - If multiple entries share an id, the **first** occurrence wins;
    ///   later ones are dropped.
    /// - Fails with `Empty` when nothing survives, `UnknownNode` when
    ///   `own_id` is not part of the fleet.
    pub fn from_genesis(mut vals: Vec<NodeEntry>, own_id: NodeId) -> Result<Self, RosterError> {
        // stable sort, so declaration order survives among equal ids
        vals.sort_by(|a, b| a.id.cmp(&b.id));

        let mut entries: Vec<NodeEntry> = Vec::with_capacity(vals.len());
        for v in vals {
            if entries.last().map(|e| e.id) == Some(v.id) {
                continue; // drop duplicates by id (keep first)
            }
            entries.push(v);
        }

        if entries.is_empty() {
            return Err(RosterError::Empty);
        }

        let my_index = entries
            .binary_search_by(|e| e.id.cmp(&own_id))
            .map_err(|_| RosterError::UnknownNode(own_id))?;

        Ok(Self { entries, my_index })
    }

    /// Zero-based position of `id` within the ordering.
    #[inline]
    pub fn position_of(&self, id: NodeId) -> Option<u64> {
        // binary search because entries are sorted by id
        self.entries
            .binary_search_by(|e| e.id.cmp(&id))
            .ok()
            .map(|idx| idx as u64)
    }

    /// Entry at `position`, if the position is within the fleet.
    #[inline]
    pub fn get(&self, position: u64) -> Option<&NodeEntry> {
        usize::try_from(position)
            .ok()
            .and_then(|idx| self.entries.get(idx))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ValidatorRoster for StaticRoster {
    #[inline]
    fn nodes_count(&self) -> u64 {
        self.entries.len() as u64
    }

    #[inline]
    fn my_position(&self) -> u64 {
        self.my_index as u64
    }
}

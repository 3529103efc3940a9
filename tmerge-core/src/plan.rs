//! Per-piece source selection.
//!
//! Priority is a fixed total order: the origin first, then candidates in the
//! order the caller listed them. The first source whose digest at index `i`
//! equals the authoritative digest supplies piece `i`.

use crate::pieces::PieceTable;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceId {
    Origin,
    /// Position in the caller's ordered candidate list.
    Candidate(usize),
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    Source(SourceId),
    /// No source has a valid copy of this piece.
    Unmatched,
}

impl Selection {
    /// The source whose bytes get written. Unmatched pieces fall back to the
    /// origin so the output keeps its length.
    pub fn read_from(self) -> SourceId {
        match self {
            Selection::Source(id) => id,
            Selection::Unmatched => SourceId::Origin,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Plan {
    selections: Vec<Selection>,
}

/// Pieces each source supplies under a plan.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceCounts {
    pub origin: usize,
    /// Indexed by candidate position.
    pub candidates: Vec<usize>,
    pub unmatched: usize,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Selection> {
        self.selections.get(index).copied()
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    pub fn unmatched_indices(&self) -> Vec<usize> {
        self.selections
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == Selection::Unmatched)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        !self.selections.contains(&Selection::Unmatched)
    }

    pub fn source_counts(&self, candidates: usize) -> SourceCounts {
        let mut c = SourceCounts { candidates: vec![0; candidates], ..Default::default() };
        for s in &self.selections {
            match s {
                Selection::Source(SourceId::Origin) => c.origin += 1,
                Selection::Source(SourceId::Candidate(i)) => {
                    if let Some(n) = c.candidates.get_mut(*i) {
                        *n += 1;
                    }
                }
                Selection::Unmatched => c.unmatched += 1,
            }
        }
        c
    }
}

/// Build a plan covering every piece of `authoritative`.
pub fn plan(authoritative: &PieceTable, origin: &PieceTable, candidates: &[&PieceTable]) -> Plan {
    let selections = (0..authoritative.len())
        .map(|i| {
            if origin.matches_at(authoritative, i) {
                return Selection::Source(SourceId::Origin);
            }
            candidates
                .iter()
                .position(|c| c.matches_at(authoritative, i))
                .map(|ci| Selection::Source(SourceId::Candidate(ci)))
                .unwrap_or(Selection::Unmatched)
        })
        .collect();
    Plan { selections }
}

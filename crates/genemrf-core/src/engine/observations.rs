//! Observed per-gene activation states.
//!
//! Source tables carry a signed encoding (`-1`, `0`, `1`). Values are stored
//! as given; the binary clamp used by inference takes the absolute value on
//! every lookup.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::engine::errors::GeneMrfError;
use crate::engine::network::PriorNetwork;

/// Latent binary state of a gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryState {
    Inactive = 0,
    Active = 1,
}

impl BinaryState {
    pub const ALL: [BinaryState; 2] = [BinaryState::Inactive, BinaryState::Active];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Mapping from gene identifier to observed state. Absent genes are unobserved.
#[derive(Debug, Clone, Default)]
pub struct ObservedStates {
    states: FxHashMap<Arc<str>, i64>,
}

impl ObservedStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds from `(gene, final_state)` rows; a repeated gene keeps its last value.
    pub fn from_rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        let mut observed = Self::new();
        for (gene, state) in rows {
            observed.insert(gene.as_ref(), state);
        }
        observed
    }

    pub fn insert(&mut self, gene: &str, state: i64) {
        self.states.insert(Arc::from(gene), state);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Raw (possibly signed) observed value.
    pub fn get(&self, gene: &str) -> Option<i64> {
        self.states.get(gene).copied()
    }

    pub fn is_observed(&self, gene: &str) -> bool {
        self.states.contains_key(gene)
    }

    pub fn genes(&self) -> impl Iterator<Item = &Arc<str>> + '_ {
        self.states.keys()
    }

    /// Binary clamp for a gene: `|state|`, or `None` when unobserved.
    ///
    /// Returns a validation error when `|state|` is neither 0 nor 1.
    pub fn clamp_state(&self, gene: &str) -> Result<Option<BinaryState>, GeneMrfError> {
        match self.get(gene) {
            None => Ok(None),
            Some(raw) => match raw.unsigned_abs() {
                0 => Ok(Some(BinaryState::Inactive)),
                1 => Ok(Some(BinaryState::Active)),
                _ => Err(GeneMrfError::ValidationError(format!(
                    "observed state for '{}' must be in {{-1, 0, 1}}, got {}",
                    gene, raw
                ))),
            },
        }
    }

    /// Resolves the clamp of every node in arena order.
    pub fn evidence_for(
        &self,
        network: &PriorNetwork,
    ) -> Result<Vec<Option<BinaryState>>, GeneMrfError> {
        network
            .nodes()
            .map(|(_, name)| self.clamp_state(name))
            .collect()
    }
}

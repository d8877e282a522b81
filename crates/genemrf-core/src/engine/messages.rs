//! Directed message storage for loopy belief propagation.
//!
//! Messages live in a flat slot array laid out in CSR form over the prior
//! network: the slots `offsets[i]..offsets[i + 1]` belong to node `i`, and
//! slot `s` with `targets[s] == j` holds the incoming message `m[j -> i]`.
//! `reverse[s]` is the slot holding `m[i -> j]`, so a node can write its
//! outgoing messages without any hashing.
//!
//! The store is double-buffered. A sweep reads only `current` and writes only
//! `next`; [`MessageStore::commit`] installs the whole sweep at once.

use crate::engine::errors::GeneMrfError;
use crate::engine::network::{NodeId, PriorNetwork};
use crate::engine::observations::BinaryState;

/// Probability distribution over a binary state, `[p(0), p(1)]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinaryDistribution([f64; 2]);

impl Default for BinaryDistribution {
    fn default() -> Self {
        Self::UNIFORM
    }
}

impl BinaryDistribution {
    pub const UNIFORM: BinaryDistribution = BinaryDistribution([0.5, 0.5]);

    pub fn uniform() -> Self {
        Self::UNIFORM
    }

    /// All mass on `state`.
    pub fn one_hot(state: BinaryState) -> Self {
        let mut probs = [0.0; 2];
        probs[state.index()] = 1.0;
        Self(probs)
    }

    /// Normalizes non-negative weights. Returns `None` when the total is zero
    /// or not finite.
    pub fn from_weights(weights: [f64; 2]) -> Option<Self> {
        let total = weights[0] + weights[1];
        if total > 0.0 && total.is_finite() {
            Some(Self([weights[0] / total, weights[1] / total]))
        } else {
            None
        }
    }

    /// Normalizes weights, falling back to uniform on a zero or non-finite total.
    pub fn from_weights_or_uniform(weights: [f64; 2]) -> Self {
        Self::from_weights(weights).unwrap_or(Self::UNIFORM)
    }

    #[inline]
    pub fn probability(self, state: BinaryState) -> f64 {
        self.0[state.index()]
    }

    #[inline]
    pub fn inactive(self) -> f64 {
        self.0[0]
    }

    #[inline]
    pub fn active(self) -> f64 {
        self.0[1]
    }

    #[inline]
    pub fn as_array(self) -> [f64; 2] {
        self.0
    }

    /// Re-normalizes the distribution; a no-op (up to rounding) when already normalized.
    pub fn renormalized(self) -> Self {
        Self::from_weights_or_uniform(self.0)
    }

    pub fn is_normalized(self, tolerance: f64) -> bool {
        self.0.iter().all(|p| *p >= 0.0 && p.is_finite())
            && ((self.0[0] + self.0[1]) - 1.0).abs() <= tolerance
    }

    #[inline]
    pub fn max_abs_delta(self, other: BinaryDistribution) -> f64 {
        (self.0[0] - other.0[0])
            .abs()
            .max((self.0[1] - other.0[1]).abs())
    }

    pub fn is_finite(self) -> bool {
        self.0[0].is_finite() && self.0[1].is_finite()
    }
}

/// CSR layout of the directed message slots of a network.
#[derive(Debug, Clone)]
pub struct NeighborIndex {
    offsets: Vec<usize>,
    targets: Vec<NodeId>,
    reverse: Vec<usize>,
}

impl NeighborIndex {
    /// Builds the slot layout with each node's neighbors sorted by id.
    pub fn build(network: &PriorNetwork) -> Result<Self, GeneMrfError> {
        let mut offsets = Vec::with_capacity(network.node_count() + 1);
        let mut targets = Vec::new();
        offsets.push(0);
        for (id, _) in network.nodes() {
            let start = targets.len();
            targets.extend_from_slice(network.neighbors(id));
            targets[start..].sort_unstable();
            offsets.push(targets.len());
        }

        let mut reverse = Vec::with_capacity(targets.len());
        for owner in 0..network.node_count() {
            for slot in offsets[owner]..offsets[owner + 1] {
                let other = targets[slot].index();
                let other_slots = &targets[offsets[other]..offsets[other + 1]];
                let position = other_slots
                    .binary_search(&NodeId(owner as u32))
                    .map_err(|_| {
                        GeneMrfError::Internal(
                            "loopy_bp: inconsistent adjacency while indexing reverse messages"
                                .into(),
                        )
                    })?;
                reverse.push(offsets[other] + position);
            }
        }

        Ok(Self {
            offsets,
            targets,
            reverse,
        })
    }

    pub fn node_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of directed message slots.
    pub fn slot_count(&self) -> usize {
        self.targets.len()
    }

    /// Incoming slot range of `node`.
    #[inline]
    pub fn slots(&self, node: usize) -> std::ops::Range<usize> {
        self.offsets[node]..self.offsets[node + 1]
    }

    /// Sender of the message stored in `slot`.
    #[inline]
    pub fn source(&self, slot: usize) -> NodeId {
        self.targets[slot]
    }

    /// Slot of the message travelling the opposite way.
    #[inline]
    pub fn reverse(&self, slot: usize) -> usize {
        self.reverse[slot]
    }

    pub fn max_degree(&self) -> usize {
        self.offsets
            .windows(2)
            .map(|w| w[1] - w[0])
            .max()
            .unwrap_or(0)
    }

    /// Slot holding `m[source -> target]`, if the two are adjacent.
    pub fn slot_of(&self, source: NodeId, target: NodeId) -> Option<usize> {
        let range = self.slots(target.index());
        let start = range.start;
        self.targets[range]
            .binary_search(&source)
            .ok()
            .map(|position| start + position)
    }
}

/// Double-buffered message state owned by a single propagation run.
#[derive(Debug, Clone)]
pub struct MessageStore {
    current: Vec<BinaryDistribution>,
    next: Vec<BinaryDistribution>,
}

impl MessageStore {
    /// Seeds every message `m[j -> i]` with the clamp of its sender `j`, or
    /// uniform when `j` is unobserved.
    pub fn initialize(index: &NeighborIndex, evidence: &[Option<BinaryState>]) -> Self {
        let current: Vec<BinaryDistribution> = (0..index.slot_count())
            .map(|slot| match evidence[index.source(slot).index()] {
                Some(state) => BinaryDistribution::one_hot(state),
                None => BinaryDistribution::UNIFORM,
            })
            .collect();
        let next = current.clone();
        Self { current, next }
    }

    #[inline]
    pub fn incoming(&self, slot: usize) -> BinaryDistribution {
        self.current[slot]
    }

    pub fn current(&self) -> &[BinaryDistribution] {
        &self.current
    }

    /// Writes a message for the sweep in progress.
    #[inline]
    pub(crate) fn stage(&mut self, slot: usize, message: BinaryDistribution) {
        self.next[slot] = message;
    }

    /// Installs the staged sweep. Returns the max absolute change per message.
    pub(crate) fn commit(&mut self) -> f64 {
        let delta = self
            .current
            .iter()
            .zip(self.next.iter())
            .fold(0.0_f64, |acc, (old, new)| acc.max(old.max_abs_delta(*new)));
        std::mem::swap(&mut self.current, &mut self.next);
        delta
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_idempotent() {
        let dist = BinaryDistribution::from_weights([3.0, 1.0]).expect("positive total");
        assert!((dist.inactive() - 0.75).abs() < 1e-12);
        let again = dist.renormalized();
        assert!(dist.max_abs_delta(again) < 1e-15);
    }

    #[test]
    fn zero_weights_fall_back_to_uniform() {
        assert!(BinaryDistribution::from_weights([0.0, 0.0]).is_none());
        assert_eq!(
            BinaryDistribution::from_weights_or_uniform([0.0, 0.0]),
            BinaryDistribution::UNIFORM
        );
        assert_eq!(
            BinaryDistribution::from_weights_or_uniform([f64::NAN, 1.0]),
            BinaryDistribution::UNIFORM
        );
    }

    #[test]
    fn reverse_slots_pair_up() {
        let network = PriorNetwork::from_pairs([("A", "B"), ("B", "C"), ("C", "A"), ("C", "C")]);
        let index = NeighborIndex::build(&network).expect("index");
        assert_eq!(index.slot_count(), 7);
        for slot in 0..index.slot_count() {
            assert_eq!(index.reverse(index.reverse(slot)), slot);
        }
        let c = network.node_id("C").expect("C");
        let self_slot = index.slot_of(c, c).expect("self loop slot");
        assert_eq!(index.reverse(self_slot), self_slot);
    }

    #[test]
    fn initialization_clamps_observed_senders() {
        let network = PriorNetwork::from_pairs([("A", "B")]);
        let index = NeighborIndex::build(&network).expect("index");
        let evidence = vec![Some(BinaryState::Active), None];
        let store = MessageStore::initialize(&index, &evidence);

        let a = network.node_id("A").expect("A");
        let b = network.node_id("B").expect("B");
        let a_to_b = index.slot_of(a, b).expect("a->b");
        let b_to_a = index.slot_of(b, a).expect("b->a");
        assert_eq!(
            store.incoming(a_to_b),
            BinaryDistribution::one_hot(BinaryState::Active)
        );
        assert_eq!(store.incoming(b_to_a), BinaryDistribution::UNIFORM);
    }

    #[test]
    fn commit_reports_max_delta() {
        let network = PriorNetwork::from_pairs([("A", "B")]);
        let index = NeighborIndex::build(&network).expect("index");
        let mut store = MessageStore::initialize(&index, &[None, None]);
        store.stage(0, BinaryDistribution::from_weights([0.2, 0.8]).expect("w"));
        store.stage(1, BinaryDistribution::UNIFORM);
        let delta = store.commit();
        assert!((delta - 0.3).abs() < 1e-12);
        assert!((store.incoming(0).active() - 0.8).abs() < 1e-12);
    }
}

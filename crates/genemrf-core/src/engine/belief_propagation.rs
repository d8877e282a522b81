//! Loopy belief propagation over the pairwise binary MRF of a prior network.
//!
//! Every prior edge `(i, j)` carries the compatibility potential
//! `exp(lambda + mu * [x_i == x_j])`; observed genes seed their outgoing
//! messages with a one-hot clamp. Messages are updated with the sum-product
//! rule on a synchronous schedule: each sweep reads only the previous sweep's
//! messages and the whole sweep is installed at once.
//!
//! By default the engine runs exactly `max_iterations` sweeps. A delta-based
//! early exit is available through [`StoppingRule::MessageDelta`].

use crate::engine::control::RunControl;
use crate::engine::errors::GeneMrfError;
use crate::engine::messages::{BinaryDistribution, MessageStore, NeighborIndex};
use crate::engine::network::{NodeId, PriorNetwork};
use crate::engine::observations::{BinaryState, ObservedStates};
use crate::engine::potential::CompatibilityPotential;

pub const DEFAULT_LAMBDA: f64 = 0.6;
pub const DEFAULT_MU: f64 = 0.8;
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
/// Smoothing added to every unnormalized message entry.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// When to stop sweeping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "kind", rename_all = "snake_case")
)]
pub enum StoppingRule {
    /// Always run the full iteration budget.
    #[default]
    FixedIterations,
    /// Stop once a sweep changes no message entry by more than `tolerance`.
    MessageDelta { tolerance: f64 },
}

/// How observed states enter the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum EvidencePolicy {
    /// Observations only seed the initial messages.
    #[default]
    Initialization,
    /// Observations also act as a one-hot unary factor in every outgoing
    /// message update of the observed node.
    Clamped,
}

/// Configuration for loopy belief propagation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BeliefPropagationConfig {
    /// Prior-edge weight. Non-negative.
    pub lambda: f64,
    /// Same-state compatibility weight. Non-negative; larger favors agreement.
    pub mu: f64,
    /// Sweep budget. Zero leaves beliefs derived from the initial messages.
    pub max_iterations: usize,
    /// Positive smoothing constant added before normalization.
    pub epsilon: f64,
    pub stopping: StoppingRule,
    pub evidence: EvidencePolicy,
}

impl Default for BeliefPropagationConfig {
    fn default() -> Self {
        Self {
            lambda: DEFAULT_LAMBDA,
            mu: DEFAULT_MU,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            epsilon: DEFAULT_EPSILON,
            stopping: StoppingRule::FixedIterations,
            evidence: EvidencePolicy::Initialization,
        }
    }
}

impl BeliefPropagationConfig {
    pub fn with_mu(mut self, mu: f64) -> Self {
        self.mu = mu;
        self
    }

    pub(crate) fn validate(self) -> Result<Self, GeneMrfError> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(GeneMrfError::ValidationError(
                "loopy_bp: epsilon must be finite and > 0".into(),
            ));
        }
        if let StoppingRule::MessageDelta { tolerance } = self.stopping {
            if !tolerance.is_finite() || tolerance <= 0.0 {
                return Err(GeneMrfError::ValidationError(
                    "loopy_bp: message-delta tolerance must be finite and > 0".into(),
                ));
            }
        }
        // lambda / mu ranges are checked when the potential is tabulated.
        CompatibilityPotential::new(self.lambda, self.mu)?;
        Ok(self)
    }
}

/// Runtime diagnostics emitted by loopy belief propagation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BeliefPropagationDiagnostics {
    /// Sweep budget configured for this run.
    pub max_iterations: usize,
    /// Number of synchronous sweeps actually executed.
    pub iterations_run: usize,
    /// Whether the message-delta rule stopped the run early. Always false
    /// under [`StoppingRule::FixedIterations`].
    pub converged: bool,
    /// Max absolute message change in the last sweep.
    pub final_max_message_delta: f64,
    pub node_count: usize,
    /// Number of directed messages (two per edge, one per self-loop).
    pub message_count: usize,
    /// Nodes without neighbors; their beliefs are uniform.
    pub isolated_node_count: usize,
}

/// Per-node marginal beliefs, indexed by [`NodeId`].
#[derive(Debug, Clone, PartialEq)]
pub struct NodeBeliefs {
    beliefs: Vec<BinaryDistribution>,
}

impl NodeBeliefs {
    pub fn get(&self, id: NodeId) -> Option<BinaryDistribution> {
        self.beliefs.get(id.index()).copied()
    }

    /// Belief of a gene by name.
    pub fn for_gene(&self, network: &PriorNetwork, gene: &str) -> Option<BinaryDistribution> {
        network.node_id(gene).and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.beliefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beliefs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, BinaryDistribution)> + '_ {
        self.beliefs
            .iter()
            .enumerate()
            .map(|(idx, belief)| (NodeId(idx as u32), *belief))
    }

    pub fn as_slice(&self) -> &[BinaryDistribution] {
        &self.beliefs
    }
}

/// Runs loopy belief propagation and returns per-node beliefs.
pub fn run_loopy_belief_propagation(
    network: &PriorNetwork,
    observations: &ObservedStates,
    config: BeliefPropagationConfig,
) -> Result<NodeBeliefs, GeneMrfError> {
    run_loopy_belief_propagation_with_diagnostics(network, observations, config)
        .map(|(beliefs, _)| beliefs)
}

/// Runs loopy belief propagation and returns beliefs with diagnostics.
pub fn run_loopy_belief_propagation_with_diagnostics(
    network: &PriorNetwork,
    observations: &ObservedStates,
    config: BeliefPropagationConfig,
) -> Result<(NodeBeliefs, BeliefPropagationDiagnostics), GeneMrfError> {
    run_loopy_belief_propagation_with_control(
        network,
        observations,
        config,
        &RunControl::unbounded(),
    )
}

/// Runs loopy belief propagation, checking `control` before every sweep.
pub fn run_loopy_belief_propagation_with_control(
    network: &PriorNetwork,
    observations: &ObservedStates,
    config: BeliefPropagationConfig,
    control: &RunControl,
) -> Result<(NodeBeliefs, BeliefPropagationDiagnostics), GeneMrfError> {
    let config = config.validate()?;
    let potential = CompatibilityPotential::new(config.lambda, config.mu)?;
    let evidence = observations.evidence_for(network)?;
    let index = NeighborIndex::build(network)?;
    let mut store = MessageStore::initialize(&index, &evidence);

    let mut diagnostics = BeliefPropagationDiagnostics {
        max_iterations: config.max_iterations,
        iterations_run: 0,
        converged: false,
        final_max_message_delta: 0.0,
        node_count: index.node_count(),
        message_count: index.slot_count(),
        isolated_node_count: network.isolated_node_count(),
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        nodes = diagnostics.node_count,
        messages = diagnostics.message_count,
        lambda = config.lambda,
        mu = config.mu,
        max_iterations = config.max_iterations,
        "loopy_bp: starting"
    );

    let mut sweeper = Sweeper::new(&index, &evidence, &potential, &config);
    for iteration in 0..config.max_iterations {
        control.check("loopy_bp")?;

        sweeper.sweep(&mut store)?;
        let max_delta = store.commit();
        diagnostics.iterations_run = iteration + 1;
        diagnostics.final_max_message_delta = max_delta;

        if let StoppingRule::MessageDelta { tolerance } = config.stopping {
            if max_delta < tolerance {
                diagnostics.converged = true;
                break;
            }
        }
    }

    let beliefs = compute_marginals(&index, &store);

    #[cfg(feature = "tracing")]
    tracing::debug!(
        iterations_run = diagnostics.iterations_run,
        converged = diagnostics.converged,
        final_max_message_delta = diagnostics.final_max_message_delta,
        "loopy_bp: finished"
    );

    Ok((beliefs, diagnostics))
}

/// Per-run sweep state: the static model plus reusable product buffers.
struct Sweeper<'a> {
    index: &'a NeighborIndex,
    evidence: &'a [Option<BinaryState>],
    potential: &'a CompatibilityPotential,
    epsilon: f64,
    evidence_policy: EvidencePolicy,
    prefix: Vec<[f64; 2]>,
    suffix: Vec<[f64; 2]>,
}

impl<'a> Sweeper<'a> {
    fn new(
        index: &'a NeighborIndex,
        evidence: &'a [Option<BinaryState>],
        potential: &'a CompatibilityPotential,
        config: &BeliefPropagationConfig,
    ) -> Self {
        let capacity = index.max_degree() + 1;
        Self {
            index,
            evidence,
            potential,
            epsilon: config.epsilon,
            evidence_policy: config.evidence,
            prefix: Vec::with_capacity(capacity),
            suffix: Vec::with_capacity(capacity),
        }
    }

    /// Stages a fresh message for every directed edge from the committed ones.
    ///
    /// For sender `i`, the leave-one-out product over `N(i) \ {j}` is taken
    /// from prefix/suffix products of the incoming messages, so each node
    /// costs O(degree) instead of O(degree^2).
    fn sweep(&mut self, store: &mut MessageStore) -> Result<(), GeneMrfError> {
        let table = *self.potential.table();

        for node in 0..self.index.node_count() {
            let slots = self.index.slots(node);
            let degree = slots.len();
            if degree == 0 {
                continue;
            }

            self.prefix.clear();
            self.prefix.push([1.0, 1.0]);
            for slot in slots.clone() {
                let incoming = store.incoming(slot).as_array();
                let last = self.prefix[self.prefix.len() - 1];
                self.prefix
                    .push([last[0] * incoming[0], last[1] * incoming[1]]);
            }

            self.suffix.clear();
            self.suffix.resize(degree + 1, [1.0, 1.0]);
            for (offset, slot) in slots.clone().enumerate().rev() {
                let incoming = store.incoming(slot).as_array();
                let next = self.suffix[offset + 1];
                self.suffix[offset] = [next[0] * incoming[0], next[1] * incoming[1]];
            }

            let unary = match (self.evidence_policy, self.evidence[node]) {
                (EvidencePolicy::Clamped, Some(state)) => {
                    BinaryDistribution::one_hot(state).as_array()
                }
                _ => [1.0, 1.0],
            };

            for (offset, slot) in slots.enumerate() {
                let before = self.prefix[offset];
                let after = self.suffix[offset + 1];
                let excluded = [
                    unary[0] * before[0] * after[0],
                    unary[1] * before[1] * after[1],
                ];

                let mut weights = [0.0_f64; 2];
                for x_j in BinaryState::ALL {
                    let mut sum = 0.0;
                    for x_i in BinaryState::ALL {
                        sum += table[x_i.index()][x_j.index()] * excluded[x_i.index()];
                    }
                    weights[x_j.index()] = sum + self.epsilon;
                }

                let message = BinaryDistribution::from_weights(weights).ok_or_else(|| {
                    GeneMrfError::Numerical(format!(
                        "loopy_bp: non-finite message from node {} (weights {:?})",
                        node, weights
                    ))
                })?;
                store.stage(self.index.reverse(slot), message);
            }
        }

        Ok(())
    }
}

/// `belief_i(x) ∝ prod_{k in N(i)} m[k -> i](x)`, uniform when the product vanishes.
fn compute_marginals(index: &NeighborIndex, store: &MessageStore) -> NodeBeliefs {
    let beliefs = (0..index.node_count())
        .map(|node| {
            let mut product = [1.0_f64, 1.0_f64];
            for slot in index.slots(node) {
                let incoming = store.incoming(slot).as_array();
                product[0] *= incoming[0];
                product[1] *= incoming[1];
            }
            // Degree-0 nodes keep [1, 1], which normalizes to uniform as well.
            BinaryDistribution::from_weights_or_uniform(product)
        })
        .collect();
    NodeBeliefs { beliefs }
}

//! # genemrf core
//!
//! Loopy belief propagation over a pairwise binary Markov random field built
//! from a prior gene network, posterior edge estimation, and a grid search
//! over the compatibility weight scored against reference gene modules.

pub mod engine;
pub mod storage;

// Re-export commonly used types
pub use engine::belief_propagation::{
    run_loopy_belief_propagation, run_loopy_belief_propagation_with_diagnostics,
    BeliefPropagationConfig, BeliefPropagationDiagnostics, EvidencePolicy, NodeBeliefs,
    StoppingRule,
};
pub use engine::control::RunControl;
pub use engine::errors::GeneMrfError;
pub use engine::mu_search::{run_mu_search, ModuleReference, MuSearchConfig, MuScoreTable};
pub use engine::network::PriorNetwork;
pub use engine::observations::ObservedStates;
pub use engine::posterior::{infer_posterior_edges, PosteriorEdge, PosteriorEdgeTable};

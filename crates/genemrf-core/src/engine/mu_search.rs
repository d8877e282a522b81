//! Grid search over the compatibility weight `mu`.
//!
//! Each candidate runs propagation and posterior estimation on its own
//! message store, thresholds the posterior table, and scores the induced
//! graph by overlap with reference gene modules:
//!
//! ```text
//! score = sum over genes of interest g present in the induced graph,
//!         with a non-empty module M(g), of |N(g) ∩ M(g)| / |M(g)|
//! ```
//!
//! Candidates are independent. With the `parallel` feature they are spread
//! over the rayon pool; rows always come back in grid order. No candidate is
//! selected inside the loop.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::engine::belief_propagation::BeliefPropagationConfig;
use crate::engine::control::RunControl;
use crate::engine::errors::GeneMrfError;
use crate::engine::network::PriorNetwork;
use crate::engine::observations::ObservedStates;
use crate::engine::posterior::infer_posterior_edges_with_control;

pub const DEFAULT_MU_START: f64 = 0.05;
pub const DEFAULT_MU_STOP: f64 = 2.0;
pub const DEFAULT_MU_COUNT: usize = 20;
pub const DEFAULT_THRESHOLD: f64 = 0.70;
pub const DEFAULT_SEARCH_ITERATIONS: usize = 10_000;

/// Scores within this distance are treated as tied by [`MuScoreTable::best`].
const SCORE_EPSILON: f64 = 1e-12;

/// `count` evenly spaced values over `[start, stop]`, endpoints included.
pub fn linspace(start: f64, stop: f64, count: usize) -> Result<Vec<f64>, GeneMrfError> {
    if !start.is_finite() || !stop.is_finite() {
        return Err(GeneMrfError::ValidationError(
            "mu_search: grid bounds must be finite".into(),
        ));
    }
    if count == 0 {
        return Err(GeneMrfError::ValidationError(
            "mu_search: grid must contain at least one value".into(),
        ));
    }
    Ok(evenly_spaced(start, stop, count))
}

fn evenly_spaced(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count == 1 {
        return vec![start];
    }
    let step = (stop - start) / (count - 1) as f64;
    (0..count)
        .map(|k| {
            if k == count - 1 {
                stop
            } else {
                start + step * k as f64
            }
        })
        .collect()
}

/// Reference modules: gene of interest -> genes expected in its module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleReference {
    modules: BTreeMap<Arc<str>, BTreeSet<Arc<str>>>,
}

impl ModuleReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_modules<I, G, M, S>(modules: I) -> Self
    where
        I: IntoIterator<Item = (G, M)>,
        G: AsRef<str>,
        M: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut reference = Self::new();
        for (gene, members) in modules {
            reference.insert(gene.as_ref(), members);
        }
        reference
    }

    /// Sets the module of `gene`; duplicate members collapse.
    pub fn insert<M, S>(&mut self, gene: &str, members: M)
    where
        M: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = members
            .into_iter()
            .map(|member| Arc::from(member.as_ref()))
            .collect();
        self.modules.insert(Arc::from(gene), set);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn module(&self, gene: &str) -> Option<&BTreeSet<Arc<str>>> {
        self.modules.get(gene)
    }

    /// Genes of interest in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &BTreeSet<Arc<str>>)> + '_ {
        self.modules.iter()
    }
}

/// Overlap score of an induced graph against the reference modules.
///
/// Empty modules and genes absent from `induced` contribute nothing.
pub fn overlap_score(induced: &PriorNetwork, reference: &ModuleReference) -> f64 {
    let mut score = 0.0;
    for (gene, module) in reference.iter() {
        if module.is_empty() {
            continue;
        }
        let Some(neighbors) = induced.neighbor_names(gene) else {
            continue;
        };
        let hits = neighbors
            .filter(|neighbor| module.contains::<str>(neighbor))
            .count();
        score += hits as f64 / module.len() as f64;
    }
    score
}

/// Configuration for the mu grid search.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct MuSearchConfig {
    /// Candidate mu values, evaluated and reported in this order.
    pub grid: Vec<f64>,
    /// Minimum posterior for an edge to enter the induced graph.
    pub threshold: f64,
    /// Propagation settings shared by every candidate; `mu` is overridden per row.
    pub propagation: BeliefPropagationConfig,
}

impl Default for MuSearchConfig {
    fn default() -> Self {
        Self {
            grid: evenly_spaced(DEFAULT_MU_START, DEFAULT_MU_STOP, DEFAULT_MU_COUNT),
            threshold: DEFAULT_THRESHOLD,
            propagation: BeliefPropagationConfig {
                max_iterations: DEFAULT_SEARCH_ITERATIONS,
                ..BeliefPropagationConfig::default()
            },
        }
    }
}

impl MuSearchConfig {
    pub(crate) fn validate(&self) -> Result<(), GeneMrfError> {
        if self.grid.is_empty() {
            return Err(GeneMrfError::ValidationError(
                "mu_search: grid must not be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(GeneMrfError::ValidationError(format!(
                "mu_search: threshold must be in [0, 1], got {}",
                self.threshold
            )));
        }
        for &mu in &self.grid {
            self.propagation.with_mu(mu).validate()?;
        }
        Ok(())
    }
}

/// Score of one mu candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MuScore {
    pub mu: f64,
    pub score: f64,
}

/// One row per grid candidate, in grid order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MuScoreTable {
    rows: Vec<MuScore>,
}

impl MuScoreTable {
    pub fn from_rows(rows: Vec<MuScore>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[MuScore] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Highest-scoring row; ties go to the earlier row.
    pub fn best(&self) -> Option<MuScore> {
        let mut best: Option<MuScore> = None;
        for row in &self.rows {
            match best {
                Some(current) if row.score <= current.score + SCORE_EPSILON => {}
                _ => best = Some(*row),
            }
        }
        best
    }
}

/// Scores a single mu candidate.
pub fn evaluate_mu(
    network: &PriorNetwork,
    observations: &ObservedStates,
    reference: &ModuleReference,
    config: &MuSearchConfig,
    mu: f64,
    control: &RunControl,
) -> Result<f64, GeneMrfError> {
    control.check("mu_search")?;
    let table = infer_posterior_edges_with_control(
        network,
        observations,
        config.propagation.with_mu(mu),
        control,
    )?;
    let induced = table.induced_network(config.threshold);
    let score = overlap_score(&induced, reference);

    #[cfg(feature = "tracing")]
    tracing::info!(
        mu,
        score,
        retained_edges = induced.edge_count(),
        "mu_search: candidate scored"
    );

    Ok(score)
}

/// Runs the grid search and returns one row per candidate in grid order.
pub fn run_mu_search(
    network: &PriorNetwork,
    observations: &ObservedStates,
    reference: &ModuleReference,
    config: &MuSearchConfig,
) -> Result<MuScoreTable, GeneMrfError> {
    run_mu_search_with_control(
        network,
        observations,
        reference,
        config,
        &RunControl::unbounded(),
    )
}

/// Grid search with an external cancellation signal.
pub fn run_mu_search_with_control(
    network: &PriorNetwork,
    observations: &ObservedStates,
    reference: &ModuleReference,
    config: &MuSearchConfig,
    control: &RunControl,
) -> Result<MuScoreTable, GeneMrfError> {
    config.validate()?;
    // Surface bad observations once instead of once per candidate.
    observations.evidence_for(network)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        candidates = config.grid.len(),
        threshold = config.threshold,
        "mu_search: starting"
    );

    let score_row = |mu: f64| -> Result<MuScore, GeneMrfError> {
        let score = evaluate_mu(network, observations, reference, config, mu, control)?;
        Ok(MuScore { mu, score })
    };

    #[cfg(feature = "parallel")]
    let rows: Result<Vec<MuScore>, GeneMrfError> =
        config.grid.par_iter().map(|&mu| score_row(mu)).collect();

    #[cfg(not(feature = "parallel"))]
    let rows: Result<Vec<MuScore>, GeneMrfError> =
        config.grid.iter().map(|&mu| score_row(mu)).collect();

    Ok(MuScoreTable { rows: rows? })
}

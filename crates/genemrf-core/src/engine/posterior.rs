//! Posterior edge probabilities derived from node beliefs.
//!
//! The posterior of a prior edge `(i, j)` is the probability that both
//! endpoints hold the same latent state:
//!
//! ```text
//! posterior(i, j) = b_i(1) * b_j(1) + b_i(0) * b_j(0)
//! ```
//!
//! Downstream thresholding depends on this exact form.

use std::sync::Arc;

use crate::engine::belief_propagation::{
    run_loopy_belief_propagation_with_control, BeliefPropagationConfig, NodeBeliefs,
};
use crate::engine::control::RunControl;
use crate::engine::errors::GeneMrfError;
use crate::engine::network::PriorNetwork;
use crate::engine::observations::ObservedStates;

const HISTOGRAM_SLACK: f64 = 1e-9;

/// One row of the posterior table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PosteriorEdge {
    pub gene_a: Arc<str>,
    pub gene_b: Arc<str>,
    pub probability: f64,
}

/// Posterior table in prior-edge order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PosteriorEdgeTable {
    rows: Vec<PosteriorEdge>,
}

/// Equal-width histogram of posterior values over [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeHistogram {
    /// Count per bin; bin `k` covers `[k / n, (k + 1) / n)`, the last bin includes 1.0.
    pub counts: Vec<usize>,
}

impl EdgeHistogram {
    pub fn bin_width(&self) -> f64 {
        1.0 / self.counts.len() as f64
    }

    /// Lower and upper bound of bin `k`.
    pub fn bounds(&self, k: usize) -> (f64, f64) {
        let width = self.bin_width();
        (k as f64 * width, (k + 1) as f64 * width)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Min / max / mean of the posterior column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosteriorSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl PosteriorEdgeTable {
    /// Computes the agreement posterior for every edge of `network`.
    pub fn estimate(network: &PriorNetwork, beliefs: &NodeBeliefs) -> Result<Self, GeneMrfError> {
        let mut rows = Vec::with_capacity(network.edge_count());
        for (a, b) in network.edges() {
            let (belief_a, belief_b) = match (beliefs.get(a), beliefs.get(b)) {
                (Some(belief_a), Some(belief_b)) => (belief_a, belief_b),
                _ => {
                    return Err(GeneMrfError::Internal(format!(
                        "posterior: missing belief for edge ({}, {})",
                        network.name(a),
                        network.name(b)
                    )))
                }
            };
            let probability = belief_a.active() * belief_b.active()
                + belief_a.inactive() * belief_b.inactive();
            rows.push(PosteriorEdge {
                gene_a: network.name(a).clone(),
                gene_b: network.name(b).clone(),
                probability,
            });
        }
        Ok(Self { rows })
    }

    pub fn from_rows(rows: Vec<PosteriorEdge>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[PosteriorEdge] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<PosteriorEdge> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PosteriorEdge> + '_ {
        self.rows.iter()
    }

    /// Rows with `probability >= threshold`, in table order.
    pub fn retained(&self, threshold: f64) -> impl Iterator<Item = &PosteriorEdge> + '_ {
        self.rows
            .iter()
            .filter(move |row| row.probability >= threshold)
    }

    /// Copy of the table restricted to `probability >= threshold`.
    pub fn thresholded(&self, threshold: f64) -> Self {
        Self {
            rows: self.retained(threshold).cloned().collect(),
        }
    }

    /// Graph induced by the retained edges; genes with no retained edge are absent.
    pub fn induced_network(&self, threshold: f64) -> PriorNetwork {
        PriorNetwork::from_pairs(
            self.retained(threshold)
                .map(|row| (row.gene_a.as_ref(), row.gene_b.as_ref())),
        )
    }

    /// Posterior of an unordered gene pair (first matching row).
    pub fn probability(&self, gene_a: &str, gene_b: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| {
                (row.gene_a.as_ref() == gene_a && row.gene_b.as_ref() == gene_b)
                    || (row.gene_a.as_ref() == gene_b && row.gene_b.as_ref() == gene_a)
            })
            .map(|row| row.probability)
    }

    /// Histogram of posterior values over `bins` equal-width bins in [0, 1].
    pub fn histogram(&self, bins: usize) -> Result<EdgeHistogram, GeneMrfError> {
        if bins == 0 {
            return Err(GeneMrfError::ValidationError(
                "histogram: bins must be > 0".into(),
            ));
        }
        let mut counts = vec![0usize; bins];
        for row in &self.rows {
            // Rounding can push an agreement product a few ulps past 1.
            if !(-HISTOGRAM_SLACK..=1.0 + HISTOGRAM_SLACK).contains(&row.probability) {
                return Err(GeneMrfError::Numerical(format!(
                    "histogram: posterior {} for ({}, {}) is outside [0, 1]",
                    row.probability, row.gene_a, row.gene_b
                )));
            }
            let scaled = row.probability.clamp(0.0, 1.0) * bins as f64;
            let bin = (scaled as usize).min(bins - 1);
            counts[bin] += 1;
        }
        Ok(EdgeHistogram { counts })
    }

    pub fn summary(&self) -> Option<PosteriorSummary> {
        if self.rows.is_empty() {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for row in &self.rows {
            min = min.min(row.probability);
            max = max.max(row.probability);
            sum += row.probability;
        }
        Some(PosteriorSummary {
            count: self.rows.len(),
            min,
            max,
            mean: sum / self.rows.len() as f64,
        })
    }
}

/// Single-run entry point: propagation followed by posterior estimation.
pub fn infer_posterior_edges(
    network: &PriorNetwork,
    observations: &ObservedStates,
    config: BeliefPropagationConfig,
) -> Result<PosteriorEdgeTable, GeneMrfError> {
    infer_posterior_edges_with_control(network, observations, config, &RunControl::unbounded())
}

pub fn infer_posterior_edges_with_control(
    network: &PriorNetwork,
    observations: &ObservedStates,
    config: BeliefPropagationConfig,
    control: &RunControl,
) -> Result<PosteriorEdgeTable, GeneMrfError> {
    let (beliefs, _) =
        run_loopy_belief_propagation_with_control(network, observations, config, control)?;
    PosteriorEdgeTable::estimate(network, &beliefs)
}

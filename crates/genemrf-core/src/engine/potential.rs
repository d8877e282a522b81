//! Pairwise compatibility potential of the binary MRF.

use crate::engine::errors::GeneMrfError;
use crate::engine::observations::BinaryState;

/// `exp(lambda + mu * [x_i == x_j])` on prior edges, `1.0` elsewhere.
///
/// The four prior-edge values are tabulated once per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompatibilityPotential {
    lambda: f64,
    mu: f64,
    table: [[f64; 2]; 2],
}

impl CompatibilityPotential {
    pub fn new(lambda: f64, mu: f64) -> Result<Self, GeneMrfError> {
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(GeneMrfError::ValidationError(format!(
                "potential: lambda must be finite and >= 0, got {}",
                lambda
            )));
        }
        if !mu.is_finite() || mu < 0.0 {
            return Err(GeneMrfError::ValidationError(format!(
                "potential: mu must be finite and >= 0, got {}",
                mu
            )));
        }

        let differ = lambda.exp();
        let agree = (lambda + mu).exp();
        if !agree.is_finite() {
            return Err(GeneMrfError::Numerical(format!(
                "potential: exp(lambda + mu) overflows for lambda={} mu={}",
                lambda, mu
            )));
        }

        Ok(Self {
            lambda,
            mu,
            table: [[agree, differ], [differ, agree]],
        })
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    #[inline]
    pub fn value(&self, x_i: BinaryState, x_j: BinaryState, prior_edge: bool) -> f64 {
        if prior_edge {
            self.table[x_i.index()][x_j.index()]
        } else {
            1.0
        }
    }

    /// Prior-edge table indexed `[x_i][x_j]`.
    #[inline]
    pub(crate) fn table(&self) -> &[[f64; 2]; 2] {
        &self.table
    }
}

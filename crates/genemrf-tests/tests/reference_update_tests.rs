//! Checks the optimized sweep against a direct evaluation of the message update.
//!
//! The reference keeps messages in a map keyed by `(sender, receiver)` and
//! recomputes every leave-one-out product from scratch, O(degree^2) per node.

use std::collections::HashMap;

use genemrf_core::engine::belief_propagation::{BeliefPropagationConfig, DEFAULT_EPSILON};
use genemrf_core::engine::network::PriorNetwork;
use genemrf_core::engine::observations::ObservedStates;
use genemrf_core::engine::posterior::infer_posterior_edges;

const EDGES: [(&str, &str); 7] = [
    ("A", "B"),
    ("B", "C"),
    ("C", "A"),
    ("C", "D"),
    ("D", "E"),
    ("E", "C"),
    ("F", "A"),
];
const OBSERVED: [(&str, i64); 3] = [("A", 1), ("D", 0), ("F", 1)];
const SWEEPS: usize = 7;

type Messages = HashMap<(&'static str, &'static str), [f64; 2]>;

fn neighbors_of(gene: &str) -> Vec<&'static str> {
    EDGES
        .iter()
        .filter_map(|&(a, b)| {
            if a == gene {
                Some(b)
            } else if b == gene {
                Some(a)
            } else {
                None
            }
        })
        .collect()
}

fn clamp_of(gene: &str) -> Option<usize> {
    OBSERVED
        .iter()
        .find(|(g, _)| *g == gene)
        .map(|(_, state)| state.unsigned_abs() as usize)
}

fn normalize(weights: [f64; 2]) -> [f64; 2] {
    let total = weights[0] + weights[1];
    [weights[0] / total, weights[1] / total]
}

/// Posterior per edge in `EDGES` order after `sweeps` synchronous updates.
fn reference_posteriors(lambda: f64, mu: f64, sweeps: usize) -> Vec<f64> {
    let potential = |x_i: usize, x_j: usize| {
        if x_i == x_j {
            (lambda + mu).exp()
        } else {
            lambda.exp()
        }
    };

    let mut messages: Messages = HashMap::new();
    for &(a, b) in &EDGES {
        for (from, to) in [(a, b), (b, a)] {
            let init = match clamp_of(from) {
                Some(state) => {
                    let mut one_hot = [0.0; 2];
                    one_hot[state] = 1.0;
                    one_hot
                }
                None => [0.5, 0.5],
            };
            messages.insert((from, to), init);
        }
    }

    for _ in 0..sweeps {
        let mut next: Messages = HashMap::new();
        for (&(from, to), _) in &messages {
            let mut product = [1.0, 1.0];
            for k in neighbors_of(from) {
                if k == to {
                    continue;
                }
                let incoming = messages[&(k, from)];
                product[0] *= incoming[0];
                product[1] *= incoming[1];
            }
            let mut weights = [0.0; 2];
            for x_j in 0..2 {
                for x_i in 0..2 {
                    weights[x_j] += potential(x_i, x_j) * product[x_i];
                }
                weights[x_j] += DEFAULT_EPSILON;
            }
            next.insert((from, to), normalize(weights));
        }
        messages = next;
    }

    let belief = |gene: &str| {
        let mut product = [1.0, 1.0];
        for k in neighbors_of(gene) {
            let incoming = messages[&(k, gene)];
            product[0] *= incoming[0];
            product[1] *= incoming[1];
        }
        normalize(product)
    };

    EDGES
        .iter()
        .map(|&(a, b)| {
            let (ba, bb) = (belief(a), belief(b));
            ba[1] * bb[1] + ba[0] * bb[0]
        })
        .collect()
}

fn engine_posteriors(config: BeliefPropagationConfig) -> Vec<f64> {
    let network = PriorNetwork::from_pairs(EDGES);
    let observed = ObservedStates::from_rows(OBSERVED);
    let table = infer_posterior_edges(&network, &observed, config).expect("posterior");
    assert_eq!(table.len(), EDGES.len());
    for (row, &(a, b)) in table.iter().zip(EDGES.iter()) {
        assert_eq!((row.gene_a.as_ref(), row.gene_b.as_ref()), (a, b));
    }
    table.iter().map(|row| row.probability).collect()
}

#[test]
fn sweep_matches_direct_update_on_loopy_graph() {
    let config = BeliefPropagationConfig {
        max_iterations: SWEEPS,
        ..BeliefPropagationConfig::default()
    };
    let expected = reference_posteriors(config.lambda, config.mu, SWEEPS);
    let actual = engine_posteriors(config);
    for ((edge, want), got) in EDGES.iter().zip(&expected).zip(&actual) {
        assert!(
            (want - got).abs() < 1e-12,
            "{:?}: expected {} got {}",
            edge,
            want,
            got
        );
    }
}

#[test]
fn sweep_matches_direct_update_across_mu_and_budgets() {
    for (mu, sweeps) in [(0.05, 1), (0.8, 2), (1.5, 12), (2.0, 30)] {
        let config = BeliefPropagationConfig {
            mu,
            max_iterations: sweeps,
            ..BeliefPropagationConfig::default()
        };
        let expected = reference_posteriors(config.lambda, mu, sweeps);
        let actual = engine_posteriors(config);
        for (want, got) in expected.iter().zip(&actual) {
            assert!(
                (want - got).abs() < 1e-12,
                "mu={} sweeps={}: expected {} got {}",
                mu,
                sweeps,
                want,
                got
            );
        }
    }
}

#[test]
fn triangle_with_tail_known_values() {
    let config = BeliefPropagationConfig {
        max_iterations: SWEEPS,
        ..BeliefPropagationConfig::default()
    };
    let actual = engine_posteriors(config);
    // (A, B) and (D, E) after seven sweeps with lambda 0.6, mu 0.8.
    assert!((actual[0] - 0.500_001_959_365_532).abs() < 1e-12, "{}", actual[0]);
    assert!((actual[4] - 0.500_003_919_441_448).abs() < 1e-12, "{}", actual[4]);
}

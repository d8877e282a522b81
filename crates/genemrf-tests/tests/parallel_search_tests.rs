//! Mu search with candidates scored on the rayon pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use genemrf_core::engine::belief_propagation::BeliefPropagationConfig;
use genemrf_core::engine::control::RunControl;
use genemrf_core::engine::mu_search::{
    evaluate_mu, linspace, run_mu_search, run_mu_search_with_control, ModuleReference,
    MuSearchConfig,
};
use genemrf_core::engine::network::PriorNetwork;
use genemrf_core::engine::observations::ObservedStates;
use genemrf_core::GeneMrfError;

/// Ring of `size` genes with a chord every fifth gene.
fn ring_network(size: usize) -> PriorNetwork {
    let name = |k: usize| format!("g{}", k % size);
    let mut pairs: Vec<(String, String)> = (0..size).map(|k| (name(k), name(k + 1))).collect();
    pairs.extend((0..size).step_by(5).map(|k| (name(k), name(k + size / 2))));
    PriorNetwork::from_pairs(pairs)
}

fn ring_states(size: usize) -> ObservedStates {
    ObservedStates::from_rows((0..size).step_by(3).map(|k| (format!("g{}", k), (k % 2) as i64)))
}

fn ring_reference(size: usize) -> ModuleReference {
    ModuleReference::from_modules((0..size).step_by(10).map(|k| {
        (
            format!("g{}", k),
            vec![format!("g{}", (k + 1) % size), format!("g{}", (k + size / 2) % size)],
        )
    }))
}

#[test]
fn parallel_rows_match_single_candidate_scores() {
    let network = ring_network(60);
    let observed = ring_states(60);
    let reference = ring_reference(60);
    let grid = vec![1.5, 0.25, 1.0, 0.05, 0.8, 2.0, 0.4, 1.2];
    let config = MuSearchConfig {
        grid: grid.clone(),
        threshold: 0.5,
        propagation: BeliefPropagationConfig {
            max_iterations: 40,
            ..BeliefPropagationConfig::default()
        },
    };

    let table = run_mu_search(&network, &observed, &reference, &config).expect("search");
    assert_eq!(table.len(), grid.len());
    for (row, &mu) in table.rows().iter().zip(&grid) {
        let expected = evaluate_mu(
            &network,
            &observed,
            &reference,
            &config,
            mu,
            &RunControl::unbounded(),
        )
        .expect("single candidate");
        assert_eq!(row.mu.to_bits(), mu.to_bits());
        assert_eq!(
            row.score.to_bits(),
            expected.to_bits(),
            "mu={} pooled={} single={}",
            mu,
            row.score,
            expected
        );
    }
}

#[test]
fn cancellation_mid_grid_stops_pooled_candidates() {
    let network = ring_network(400);
    let observed = ring_states(400);
    let config = MuSearchConfig {
        grid: linspace(0.05, 2.0, 64).expect("grid"),
        threshold: 0.5,
        propagation: BeliefPropagationConfig {
            max_iterations: 200_000,
            ..BeliefPropagationConfig::default()
        },
    };

    let flag = Arc::new(AtomicBool::new(false));
    let control = RunControl::unbounded().with_cancel_flag(flag.clone());
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        flag.store(true, Ordering::Relaxed);
    });

    let result =
        run_mu_search_with_control(&network, &observed, &ring_reference(400), &config, &control);
    canceller.join().expect("canceller thread");

    match result {
        Err(GeneMrfError::Cancelled(message)) => {
            assert!(message.contains("cancellation requested"), "{}", message)
        }
        other => panic!("expected cancellation, got {:?}", other),
    }
}

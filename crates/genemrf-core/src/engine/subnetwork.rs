//! Shortest-path subnetwork around a gene of interest.
//!
//! Keeps the posterior rows above a threshold, then returns those whose edge
//! lies on at least one shortest path from the gene of interest to another
//! gene within `max_path_length` hops. In an unweighted graph that is exactly
//! the set of edges joining consecutive BFS layers up to that depth.

use std::collections::VecDeque;

use crate::engine::errors::GeneMrfError;
use crate::engine::posterior::PosteriorEdgeTable;

pub const DEFAULT_MAX_PATH_LENGTH: usize = 2;

/// Extracts the shortest-path subnetwork of `gene` from a posterior table.
///
/// Rows keep their table orientation and order. A gene absent from the
/// thresholded graph yields an empty table.
pub fn extract_subnetwork(
    table: &PosteriorEdgeTable,
    gene: &str,
    threshold: f64,
    max_path_length: usize,
) -> Result<PosteriorEdgeTable, GeneMrfError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(GeneMrfError::ValidationError(format!(
            "subnetwork: threshold must be in [0, 1], got {}",
            threshold
        )));
    }

    let induced = table.induced_network(threshold);
    let Some(source) = induced.node_id(gene) else {
        return Ok(PosteriorEdgeTable::default());
    };

    let mut distance: Vec<Option<usize>> = vec![None; induced.node_count()];
    distance[source.index()] = Some(0);
    let mut queue = VecDeque::from([source]);
    while let Some(node) = queue.pop_front() {
        let depth = distance[node.index()].unwrap_or(0);
        if depth >= max_path_length {
            continue;
        }
        for &next in induced.neighbors(node) {
            if distance[next.index()].is_none() {
                distance[next.index()] = Some(depth + 1);
                queue.push_back(next);
            }
        }
    }

    let on_shortest_path = |a: &str, b: &str| -> bool {
        // The induced graph stores trimmed names.
        let (Some(a), Some(b)) = (induced.node_id(a.trim()), induced.node_id(b.trim())) else {
            return false;
        };
        match (distance[a.index()], distance[b.index()]) {
            (Some(da), Some(db)) => da.abs_diff(db) == 1,
            _ => false,
        }
    };

    let rows = table
        .retained(threshold)
        .filter(|row| on_shortest_path(&row.gene_a, &row.gene_b))
        .cloned()
        .collect();

    #[cfg(feature = "tracing")]
    tracing::debug!(gene, threshold, max_path_length, "subnetwork: extracted");

    Ok(PosteriorEdgeTable::from_rows(rows))
}

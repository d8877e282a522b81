//! # Prior Network
//!
//! Undirected gene graph built from a two-column edge list.
//!
//! ## Design
//!
//! - Genes are interned once as `Arc<str>` and addressed by a dense `NodeId`
//!   arena index, so downstream state (messages, beliefs) can live in flat
//!   vectors instead of hash maps keyed by gene names.
//! - Edges are unordered. A repeated pair (in either orientation) is ignored;
//!   the first-seen orientation is the one reported by [`PriorNetwork::edges`].
//! - Self-loops are kept as a single edge; the node lists itself once as a
//!   neighbor.
//! - Disconnected graphs and degree-0 nodes are valid.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Maximum size for inline neighbor storage in SmallVec
const INLINE_NEIGHBORS: usize = 8;

/// Cell values treated as missing when building from raw rows.
const MISSING_MARKERS: [&str; 6] = ["NA", "NaN", "nan", "N/A", "null", "None"];

/// A dense identifier for a gene node in a [`PriorNetwork`].
///
/// NodeId implements Ord/PartialOrd for stable, deterministic iteration.
/// Uses u32 internally for efficient storage and indexing.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Undirected prior network over gene identifiers.
#[derive(Debug, Clone, Default)]
pub struct PriorNetwork {
    names: Vec<Arc<str>>,
    index: FxHashMap<Arc<str>, NodeId>,
    adjacency: Vec<SmallVec<[NodeId; INLINE_NEIGHBORS]>>,
    edges: Vec<(NodeId, NodeId)>,
    edge_index: FxHashMap<(NodeId, NodeId), usize>,
    dropped_rows: usize,
}

impl PriorNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a network from raw `(Gene_A, Gene_B)` rows.
    ///
    /// Rows where either side is absent, blank, or a missing-value marker
    /// (`NA`, `NaN`, ...) are dropped and counted in [`Self::dropped_rows`].
    pub fn from_rows<I, A, B>(rows: I) -> Self
    where
        I: IntoIterator<Item = (Option<A>, Option<B>)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let mut network = Self::new();
        for (gene_a, gene_b) in rows {
            let gene_a = gene_a.as_ref().and_then(|a| present_cell(a.as_ref()));
            let gene_b = gene_b.as_ref().and_then(|b| present_cell(b.as_ref()));
            match (gene_a, gene_b) {
                (Some(a), Some(b)) => {
                    network.add_edge(a, b);
                }
                _ => network.dropped_rows += 1,
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            nodes = network.node_count(),
            edges = network.edge_count(),
            dropped_rows = network.dropped_rows,
            "built prior network"
        );

        network
    }

    /// Builds a network from complete pairs.
    pub fn from_pairs<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        Self::from_rows(pairs.into_iter().map(|(a, b)| (Some(a), Some(b))))
    }

    /// Returns the node for `name`, interning it without edges when new.
    pub fn ensure_node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = NodeId(self.names.len() as u32);
        let name: Arc<str> = Arc::from(name);
        self.names.push(name.clone());
        self.index.insert(name, id);
        self.adjacency.push(SmallVec::new());
        id
    }

    /// Adds isolated nodes for every listed gene that is not yet present.
    pub fn with_isolated_nodes<I, S>(mut self, genes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for gene in genes {
            self.ensure_node(gene.as_ref());
        }
        self
    }

    /// Adds an undirected edge. Returns `false` if the pair was already present.
    pub fn add_edge(&mut self, gene_a: &str, gene_b: &str) -> bool {
        let a = self.ensure_node(gene_a);
        let b = self.ensure_node(gene_b);
        let key = canonical(a, b);
        if self.edge_index.contains_key(&key) {
            return false;
        }
        self.edge_index.insert(key, self.edges.len());
        self.edges.push((a, b));
        self.adjacency[a.index()].push(b);
        if a != b {
            self.adjacency[b.index()].push(a);
        }
        true
    }

    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of input rows discarded for missing values.
    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Gene name for a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this network.
    pub fn name(&self, id: NodeId) -> &Arc<str> {
        &self.names[id.index()]
    }

    /// Iterates nodes in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Arc<str>)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(idx, name)| (NodeId(idx as u32), name))
    }

    /// Neighbors of a node in insertion order. Unknown ids yield an empty slice.
    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        self.adjacency
            .get(id.index())
            .map(|adjacent| adjacent.as_slice())
            .unwrap_or(&[])
    }

    /// Neighbor names of a gene, or `None` if the gene is not in the network.
    pub fn neighbor_names(&self, name: &str) -> Option<impl Iterator<Item = &Arc<str>> + '_> {
        let id = self.node_id(name)?;
        Some(self.neighbors(id).iter().map(move |n| self.name(*n)))
    }

    pub fn degree(&self, id: NodeId) -> usize {
        self.neighbors(id).len()
    }

    pub fn has_edge_between(&self, a: NodeId, b: NodeId) -> bool {
        self.edge_index.contains_key(&canonical(a, b))
    }

    /// Edge existence test by gene name (orientation-insensitive).
    pub fn has_edge(&self, gene_a: &str, gene_b: &str) -> bool {
        match (self.node_id(gene_a), self.node_id(gene_b)) {
            (Some(a), Some(b)) => self.has_edge_between(a, b),
            _ => false,
        }
    }

    /// Iterates each edge once in first-seen order and orientation.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.edges.iter().copied()
    }

    /// Number of nodes with no neighbors.
    pub fn isolated_node_count(&self) -> usize {
        self.adjacency.iter().filter(|adj| adj.is_empty()).count()
    }
}

#[inline]
fn canonical(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn present_cell(cell: &str) -> Option<&str> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || MISSING_MARKERS.contains(&trimmed) {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_undirected_edges_once() {
        let network = PriorNetwork::from_pairs([("A", "B"), ("B", "A"), ("B", "C")]);
        assert_eq!(network.node_count(), 3);
        assert_eq!(network.edge_count(), 2);
        assert!(network.has_edge("A", "B"));
        assert!(network.has_edge("B", "A"));
        assert!(!network.has_edge("A", "C"));

        let edges: Vec<_> = network
            .edges()
            .map(|(a, b)| (network.name(a).to_string(), network.name(b).to_string()))
            .collect();
        assert_eq!(
            edges,
            vec![("A".to_string(), "B".to_string()), ("B".into(), "C".into())]
        );
    }

    #[test]
    fn closing_edge_keeps_input_orientation() {
        let network = PriorNetwork::from_pairs([("A", "B"), ("B", "C"), ("C", "A")]);
        let edges: Vec<_> = network
            .edges()
            .map(|(a, b)| (network.name(a).to_string(), network.name(b).to_string()))
            .collect();
        assert_eq!(edges[2], ("C".to_string(), "A".to_string()));
    }

    #[test]
    fn drops_rows_with_missing_values() {
        let rows = vec![
            (Some("A"), Some("B")),
            (None, Some("C")),
            (Some("D"), Some("  ")),
            (Some("NA"), Some("E")),
            (Some("B"), Some("C")),
        ];
        let network = PriorNetwork::from_rows(rows);
        assert_eq!(network.dropped_rows(), 3);
        assert_eq!(network.edge_count(), 2);
        assert!(!network.contains("D"));
        assert!(!network.contains("E"));
    }

    #[test]
    fn self_loop_lists_node_once() {
        let network = PriorNetwork::from_pairs([("A", "A"), ("A", "B")]);
        let a = network.node_id("A").expect("A");
        assert_eq!(network.degree(a), 2);
        assert_eq!(network.edge_count(), 2);
        assert!(network.has_edge("A", "A"));
    }

    #[test]
    fn isolated_nodes_have_no_neighbors() {
        let network = PriorNetwork::from_pairs([("A", "B")]).with_isolated_nodes(["Z", "A"]);
        let z = network.node_id("Z").expect("Z");
        assert_eq!(network.node_count(), 3);
        assert!(network.neighbors(z).is_empty());
        assert_eq!(network.isolated_node_count(), 1);
    }

    #[test]
    fn neighbor_names_for_unknown_gene_is_none() {
        let network = PriorNetwork::from_pairs([("A", "B")]);
        assert!(network.neighbor_names("Q").is_none());
        let names: Vec<_> = network
            .neighbor_names("A")
            .expect("A present")
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["B".to_string()]);
    }
}

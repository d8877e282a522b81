//! Integer encoding of gene identifiers for downstream network tools.

use std::sync::Arc;

use rustc_hash::FxHashMap;

/// Maps genes to 1-based codes taken from their position in an order list.
#[derive(Debug, Clone, Default)]
pub struct GeneEncoder {
    codes: FxHashMap<Arc<str>, u32>,
}

/// Encoded edge list plus the number of pairs that could not be encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedEdges {
    pub pairs: Vec<(u32, u32)>,
    pub skipped: usize,
}

impl GeneEncoder {
    /// Gene at position `k` gets code `k + 1`; a repeated gene keeps its last position.
    pub fn from_order<I, S>(genes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codes = genes
            .into_iter()
            .enumerate()
            .map(|(position, gene)| (Arc::from(gene.as_ref()), position as u32 + 1))
            .collect();
        Self { codes }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn code(&self, gene: &str) -> Option<u32> {
        self.codes.get(gene).copied()
    }

    /// Encodes pairs in order, skipping any pair with an unknown gene.
    pub fn encode_pairs<I, A, B>(&self, pairs: I) -> EncodedEdges
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let mut encoded = EncodedEdges::default();
        for (a, b) in pairs {
            match (self.code(a.as_ref()), self.code(b.as_ref())) {
                (Some(a), Some(b)) => encoded.pairs.push((a, b)),
                _ => encoded.skipped += 1,
            }
        }
        encoded
    }
}

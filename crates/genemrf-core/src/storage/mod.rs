//! Table and document I/O for networks, observations, modules, and results.
//!
//! Inputs:
//! - prior network: tab-separated, header with `Gene_A` and `Gene_B`
//! - observed states: comma-separated, header with `geneSymbol` and `final_state`
//! - reference modules: JSON object of gene -> array of genes
//!
//! Outputs are plain CSV with a header row. The encoding step uses headerless
//! tab-separated files on both sides.
//!
//! Every path function has a `_from` / `_to` twin over `Read` / `Write`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::engine::errors::GeneMrfError;
use crate::engine::mu_search::{ModuleReference, MuScoreTable};
use crate::engine::network::PriorNetwork;
use crate::engine::observations::ObservedStates;
use crate::engine::posterior::{PosteriorEdge, PosteriorEdgeTable};

pub const GENE_A_COLUMN: &str = "Gene_A";
pub const GENE_B_COLUMN: &str = "Gene_B";
pub const GENE_SYMBOL_COLUMN: &str = "geneSymbol";
pub const FINAL_STATE_COLUMN: &str = "final_state";
pub const POSTERIOR_COLUMN: &str = "posterior_edge";

fn column(headers: &StringRecord, name: &str, source: &str) -> Result<usize, GeneMrfError> {
    headers
        .iter()
        .position(|header| header.trim() == name)
        .ok_or_else(|| GeneMrfError::Parse(format!("{}: missing column '{}'", source, name)))
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Prior network
// ---------------------------------------------------------------------------

pub fn read_prior_network(path: impl AsRef<Path>) -> Result<PriorNetwork, GeneMrfError> {
    read_prior_network_from(File::open(path)?)
}

/// Reads a tab-separated edge table. Extra columns are ignored; short rows and
/// rows with a blank or missing gene are dropped.
pub fn read_prior_network_from<R: Read>(reader: R) -> Result<PriorNetwork, GeneMrfError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let a = column(&headers, GENE_A_COLUMN, "prior network")?;
    let b = column(&headers, GENE_B_COLUMN, "prior network")?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push((
            record.get(a).map(str::to_owned),
            record.get(b).map(str::to_owned),
        ));
    }
    Ok(PriorNetwork::from_rows(rows))
}

// ---------------------------------------------------------------------------
// Observed states
// ---------------------------------------------------------------------------

pub fn read_observed_states(path: impl AsRef<Path>) -> Result<ObservedStates, GeneMrfError> {
    read_observed_states_from(File::open(path)?)
}

/// Reads the observed-state table. Rows with a blank gene are skipped; a state
/// that is not an integer (integral floats such as `1.0` are accepted) fails
/// with the offending line number.
pub fn read_observed_states_from<R: Read>(reader: R) -> Result<ObservedStates, GeneMrfError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers()?.clone();
    let gene_col = column(&headers, GENE_SYMBOL_COLUMN, "observed states")?;
    let state_col = column(&headers, FINAL_STATE_COLUMN, "observed states")?;

    let mut observed = ObservedStates::new();
    for record in reader.records() {
        let record = record?;
        let gene = match record.get(gene_col).map(str::trim) {
            Some(gene) if !gene.is_empty() => gene,
            _ => continue,
        };
        let raw = record.get(state_col).unwrap_or("");
        let state = parse_state(raw).ok_or_else(|| {
            GeneMrfError::Parse(format!(
                "observed states line {}: state '{}' for gene '{}' is not an integer",
                line_of(&record),
                raw,
                gene
            ))
        })?;
        observed.insert(gene, state);
    }
    Ok(observed)
}

fn parse_state(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Reference modules
// ---------------------------------------------------------------------------

pub fn read_module_reference(path: impl AsRef<Path>) -> Result<ModuleReference, GeneMrfError> {
    read_module_reference_from(File::open(path)?)
}

pub fn read_module_reference_from<R: Read>(reader: R) -> Result<ModuleReference, GeneMrfError> {
    let modules: BTreeMap<String, Vec<String>> = serde_json::from_reader(reader)?;
    Ok(ModuleReference::from_modules(modules))
}

// ---------------------------------------------------------------------------
// Posterior table
// ---------------------------------------------------------------------------

pub fn write_posterior_table(
    path: impl AsRef<Path>,
    table: &PosteriorEdgeTable,
) -> Result<(), GeneMrfError> {
    write_posterior_table_to(File::create(path)?, table)
}

pub fn write_posterior_table_to<W: Write>(
    writer: W,
    table: &PosteriorEdgeTable,
) -> Result<(), GeneMrfError> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record([GENE_A_COLUMN, GENE_B_COLUMN, POSTERIOR_COLUMN])?;
    for row in table.iter() {
        writer.write_record([
            &*row.gene_a,
            &*row.gene_b,
            row.probability.to_string().as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_posterior_table(path: impl AsRef<Path>) -> Result<PosteriorEdgeTable, GeneMrfError> {
    read_posterior_table_from(File::open(path)?)
}

pub fn read_posterior_table_from<R: Read>(reader: R) -> Result<PosteriorEdgeTable, GeneMrfError> {
    let mut reader = ReaderBuilder::new().from_reader(reader);
    let headers = reader.headers()?.clone();
    let a = column(&headers, GENE_A_COLUMN, "posterior table")?;
    let b = column(&headers, GENE_B_COLUMN, "posterior table")?;
    let p = column(&headers, POSTERIOR_COLUMN, "posterior table")?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or("");
        let probability = field(p).trim().parse::<f64>().map_err(|_| {
            GeneMrfError::Parse(format!(
                "posterior table line {}: '{}' is not a probability",
                line_of(&record),
                field(p)
            ))
        })?;
        rows.push(PosteriorEdge {
            gene_a: Arc::from(field(a).trim()),
            gene_b: Arc::from(field(b).trim()),
            probability,
        });
    }
    Ok(PosteriorEdgeTable::from_rows(rows))
}

// ---------------------------------------------------------------------------
// Mu scores
// ---------------------------------------------------------------------------

pub fn write_mu_scores(path: impl AsRef<Path>, table: &MuScoreTable) -> Result<(), GeneMrfError> {
    write_mu_scores_to(File::create(path)?, table)
}

pub fn write_mu_scores_to<W: Write>(writer: W, table: &MuScoreTable) -> Result<(), GeneMrfError> {
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(["mu", "score"])?;
    for row in table.rows() {
        writer.write_record([row.mu.to_string(), row.score.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Headerless files for integer encoding
// ---------------------------------------------------------------------------

fn headerless_tsv<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
}

pub fn read_gene_order(path: impl AsRef<Path>) -> Result<Vec<String>, GeneMrfError> {
    read_gene_order_from(File::open(path)?)
}

/// First column of each non-blank line, in file order.
pub fn read_gene_order_from<R: Read>(reader: R) -> Result<Vec<String>, GeneMrfError> {
    let mut genes = Vec::new();
    for record in headerless_tsv(reader).records() {
        let record = record?;
        if let Some(gene) = record.get(0).map(str::trim).filter(|g| !g.is_empty()) {
            genes.push(gene.to_owned());
        }
    }
    Ok(genes)
}

pub fn read_headerless_pairs(path: impl AsRef<Path>) -> Result<Vec<(String, String)>, GeneMrfError> {
    read_headerless_pairs_from(File::open(path)?)
}

/// First two columns of each line; lines with fewer than two fields are skipped.
pub fn read_headerless_pairs_from<R: Read>(
    reader: R,
) -> Result<Vec<(String, String)>, GeneMrfError> {
    let mut pairs = Vec::new();
    for record in headerless_tsv(reader).records() {
        let record = record?;
        if let (Some(a), Some(b)) = (record.get(0), record.get(1)) {
            pairs.push((a.trim().to_owned(), b.trim().to_owned()));
        }
    }
    Ok(pairs)
}

pub fn write_encoded_pairs(path: impl AsRef<Path>, pairs: &[(u32, u32)]) -> Result<(), GeneMrfError> {
    write_encoded_pairs_to(File::create(path)?, pairs)
}

pub fn write_encoded_pairs_to<W: Write>(writer: W, pairs: &[(u32, u32)]) -> Result<(), GeneMrfError> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(writer);
    for (a, b) in pairs {
        writer.write_record([a.to_string(), b.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_columns_are_found_by_name() {
        let input = "score\tGene_B\tGene_A\n\
                     0.3\tB\tA\n\
                     0.1\tNA\tC\n\
                     0.2\tD\n\
                     0.9\tC\tB\n";
        let network = read_prior_network_from(input.as_bytes()).expect("network");
        assert_eq!(network.edge_count(), 2);
        assert!(network.has_edge("A", "B"));
        assert!(network.has_edge("B", "C"));
        assert_eq!(network.dropped_rows(), 2);
    }

    #[test]
    fn network_without_gene_column_is_parse_error() {
        let err = read_prior_network_from("Gene_A\tOther\nA\tB\n".as_bytes()).unwrap_err();
        assert!(matches!(err, GeneMrfError::Parse(ref msg) if msg.contains("Gene_B")));
    }

    #[test]
    fn states_accept_integral_floats() {
        let input = "geneSymbol,final_state\nA,1\nB,0.0\nC,-1\n,1\n";
        let observed = read_observed_states_from(input.as_bytes()).expect("states");
        assert_eq!(observed.len(), 3);
        assert_eq!(observed.get("B"), Some(0));
        assert_eq!(observed.get("C"), Some(-1));
    }

    #[test]
    fn non_numeric_state_names_the_line() {
        let input = "geneSymbol,final_state\nA,1\nB,up\n";
        let err = read_observed_states_from(input.as_bytes()).unwrap_err();
        match err {
            GeneMrfError::Parse(msg) => {
                assert!(msg.contains("line 3"), "{}", msg);
                assert!(msg.contains("'B'"), "{}", msg);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(read_observed_states_from("geneSymbol,final_state\nA,0.5\n".as_bytes()).is_err());
    }

    #[test]
    fn modules_load_from_json() {
        let input = r#"{"G": ["X", "Y", "X"], "H": []}"#;
        let reference = read_module_reference_from(input.as_bytes()).expect("modules");
        assert_eq!(reference.len(), 2);
        assert_eq!(reference.module("G").map(|m| m.len()), Some(2));
        assert!(read_module_reference_from("[1, 2]".as_bytes()).is_err());
    }

    #[test]
    fn posterior_table_survives_a_file() {
        let table = PosteriorEdgeTable::from_rows(vec![
            PosteriorEdge {
                gene_a: Arc::from("A"),
                gene_b: Arc::from("B"),
                probability: 0.731_058_578_630_004_9,
            },
            PosteriorEdge {
                gene_a: Arc::from("B"),
                gene_b: Arc::from("C"),
                probability: 0.5,
            },
        ]);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("posterior.csv");
        write_posterior_table(&path, &table).expect("write");

        let text = std::fs::read_to_string(&path).expect("read text");
        assert!(text.starts_with("Gene_A,Gene_B,posterior_edge\n"));

        let loaded = read_posterior_table(&path).expect("read");
        assert_eq!(loaded, table);
    }

    #[test]
    fn posterior_gene_names_are_trimmed() {
        let text = "Gene_A,Gene_B,posterior_edge\nG, A,0.9\n A ,B,0.8\n";
        let loaded = read_posterior_table_from(text.as_bytes()).expect("read");
        let pairs: Vec<(&str, &str)> = loaded
            .iter()
            .map(|row| (row.gene_a.as_ref(), row.gene_b.as_ref()))
            .collect();
        assert_eq!(pairs, vec![("G", "A"), ("A", "B")]);

        let sub = crate::engine::subnetwork::extract_subnetwork(&loaded, "G", 0.5, 2)
            .expect("subnetwork");
        assert_eq!(sub.len(), 2);
    }

    #[test]
    fn mu_scores_are_written_in_order() {
        use crate::engine::mu_search::MuScore;

        let table = MuScoreTable::from_rows(vec![
            MuScore { mu: 0.05, score: 0.0 },
            MuScore { mu: 2.0, score: 1.5 },
        ]);
        let mut out = Vec::new();
        write_mu_scores_to(&mut out, &table).expect("write");
        assert_eq!(String::from_utf8(out).expect("utf8"), "mu,score\n0.05,0\n2,1.5\n");
    }

    #[test]
    fn headerless_files_for_encoding() {
        let order = read_gene_order_from("TP53\nEGFR\n\nMYC\n".as_bytes()).expect("order");
        assert_eq!(order, vec!["TP53", "EGFR", "MYC"]);

        let pairs = read_headerless_pairs_from("TP53\tEGFR\nMYC\n".as_bytes()).expect("pairs");
        assert_eq!(pairs, vec![("TP53".to_string(), "EGFR".to_string())]);

        let mut out = Vec::new();
        write_encoded_pairs_to(&mut out, &[(1, 2), (3, 1)]).expect("write");
        assert_eq!(String::from_utf8(out).expect("utf8"), "1\t2\n3\t1\n");

        assert!(read_prior_network("/nonexistent/genemrf/network.tsv").is_err());
    }
}

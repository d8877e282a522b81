//! genemrf CLI - loopy belief propagation over prior gene networks
//!
//! Usage:
//!   genemrf infer --network net.tsv --states states.csv --output posterior.csv
//!   genemrf search-mu --network net.tsv --states states.csv --modules moi.json --output mu.csv
//!   genemrf subnetwork --edges posterior.csv --gene TP53 --threshold 0.7 --output sub.csv
//!   genemrf encode --edges sub.tsv --gene-order order.tsv --output encoded.tsv
//!   genemrf histogram --edges posterior.csv --bins 30

use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;

use genemrf_core::engine::belief_propagation::{
    run_loopy_belief_propagation_with_control, BeliefPropagationConfig, EvidencePolicy,
    StoppingRule,
};
use genemrf_core::engine::control::RunControl;
use genemrf_core::engine::encoding::GeneEncoder;
use genemrf_core::engine::mu_search::{
    linspace, run_mu_search_with_control, MuSearchConfig, DEFAULT_MU_COUNT, DEFAULT_MU_START,
    DEFAULT_MU_STOP,
};
use genemrf_core::engine::posterior::PosteriorEdgeTable;
use genemrf_core::engine::subnetwork::{extract_subnetwork, DEFAULT_MAX_PATH_LENGTH};
use genemrf_core::{storage, GeneMrfError};

#[derive(Parser)]
#[command(name = "genemrf")]
#[command(version)]
#[command(about = "genemrf - posterior gene network inference with loopy belief propagation")]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. "info", "genemrf_core=debug")
    #[arg(long, global = true, default_value = "warn", value_name = "FILTER")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run propagation once and write the posterior edge table
    Infer {
        /// Prior network, tab-separated with Gene_A and Gene_B columns
        #[arg(long, value_name = "TSV")]
        network: PathBuf,

        /// Observed states, comma-separated with geneSymbol and final_state columns
        #[arg(long, value_name = "CSV")]
        states: PathBuf,

        #[arg(short, long, value_name = "CSV")]
        output: PathBuf,

        #[arg(long)]
        lambda: Option<f64>,

        #[arg(long)]
        mu: Option<f64>,

        #[arg(long)]
        iterations: Option<usize>,

        /// Stop early once no message changes by more than this
        #[arg(long)]
        tolerance: Option<f64>,

        /// Keep observed genes pinned in every update
        #[arg(long)]
        clamp_evidence: bool,

        /// JSON propagation config; flags override its fields
        #[arg(long, value_name = "JSON")]
        config: Option<PathBuf>,

        /// Abort if the run takes longer than this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Output format for the run report: summary or json
        #[arg(long, default_value = "summary", value_name = "FORMAT")]
        report: String,
    },

    /// Score a grid of mu values against reference modules
    SearchMu {
        #[arg(long, value_name = "TSV")]
        network: PathBuf,

        #[arg(long, value_name = "CSV")]
        states: PathBuf,

        /// Reference modules, JSON object of gene -> [genes]
        #[arg(long, value_name = "JSON")]
        modules: PathBuf,

        #[arg(short, long, value_name = "CSV")]
        output: PathBuf,

        #[arg(long)]
        lambda: Option<f64>,

        #[arg(long)]
        iterations: Option<usize>,

        #[arg(long)]
        threshold: Option<f64>,

        #[arg(long)]
        mu_start: Option<f64>,

        #[arg(long)]
        mu_stop: Option<f64>,

        #[arg(long)]
        mu_count: Option<usize>,

        /// JSON search config; flags override its fields
        #[arg(long, value_name = "JSON")]
        config: Option<PathBuf>,

        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Extract the shortest-path subnetwork around a gene
    Subnetwork {
        /// Posterior table written by `infer`
        #[arg(long, value_name = "CSV")]
        edges: PathBuf,

        #[arg(long)]
        gene: String,

        #[arg(long)]
        threshold: f64,

        #[arg(short, long, value_name = "CSV")]
        output: PathBuf,

        #[arg(long, default_value_t = DEFAULT_MAX_PATH_LENGTH)]
        max_path_length: usize,
    },

    /// Encode a headerless edge list as 1-based gene positions
    Encode {
        #[arg(long, value_name = "TSV")]
        edges: PathBuf,

        #[arg(long, value_name = "TSV")]
        gene_order: PathBuf,

        #[arg(short, long, value_name = "TSV")]
        output: PathBuf,
    },

    /// Print a text histogram of posterior values
    Histogram {
        #[arg(long, value_name = "CSV")]
        edges: PathBuf,

        #[arg(long, default_value_t = 30)]
        bins: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Infer {
            network,
            states,
            output,
            lambda,
            mu,
            iterations,
            tolerance,
            clamp_evidence,
            config,
            timeout,
            report,
        } => load_config::<BeliefPropagationConfig>(config.as_deref()).and_then(|mut config| {
            if let Some(lambda) = lambda {
                config.lambda = lambda;
            }
            if let Some(mu) = mu {
                config.mu = mu;
            }
            if let Some(iterations) = iterations {
                config.max_iterations = iterations;
            }
            if let Some(tolerance) = tolerance {
                config.stopping = StoppingRule::MessageDelta { tolerance };
            }
            if clamp_evidence {
                config.evidence = EvidencePolicy::Clamped;
            }
            run_infer(&network, &states, &output, config, &control(timeout), &report)
        }),
        Command::SearchMu {
            network,
            states,
            modules,
            output,
            lambda,
            iterations,
            threshold,
            mu_start,
            mu_stop,
            mu_count,
            config,
            timeout,
        } => load_config::<MuSearchConfig>(config.as_deref()).and_then(|mut config| {
            if let Some(lambda) = lambda {
                config.propagation.lambda = lambda;
            }
            if let Some(iterations) = iterations {
                config.propagation.max_iterations = iterations;
            }
            if let Some(threshold) = threshold {
                config.threshold = threshold;
            }
            if mu_start.is_some() || mu_stop.is_some() || mu_count.is_some() {
                config.grid = linspace(
                    mu_start.unwrap_or(DEFAULT_MU_START),
                    mu_stop.unwrap_or(DEFAULT_MU_STOP),
                    mu_count.unwrap_or(DEFAULT_MU_COUNT),
                )?;
            }
            run_search_mu(&network, &states, &modules, &output, &config, &control(timeout))
        }),
        Command::Subnetwork {
            edges,
            gene,
            threshold,
            output,
            max_path_length,
        } => run_subnetwork(&edges, &gene, threshold, &output, max_path_length),
        Command::Encode {
            edges,
            gene_order,
            output,
        } => run_encode(&edges, &gene_order, &output),
        Command::Histogram { edges, bins } => run_histogram(&edges, bins),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn control(timeout: Option<u64>) -> RunControl {
    match timeout {
        Some(secs) => {
            RunControl::unbounded().with_deadline(Instant::now() + Duration::from_secs(secs))
        }
        None => RunControl::unbounded(),
    }
}

fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T, GeneMrfError> {
    match path {
        Some(path) => {
            let file = std::fs::File::open(path)?;
            Ok(serde_json::from_reader(file)?)
        }
        None => Ok(T::default()),
    }
}

fn run_infer(
    network_path: &Path,
    states_path: &Path,
    output: &Path,
    config: BeliefPropagationConfig,
    control: &RunControl,
    report: &str,
) -> Result<(), GeneMrfError> {
    let network = storage::read_prior_network(network_path)?;
    let observed = storage::read_observed_states(states_path)?;
    tracing::info!(
        nodes = network.node_count(),
        edges = network.edge_count(),
        observed = observed.len(),
        "inputs loaded"
    );

    let (beliefs, diagnostics) =
        run_loopy_belief_propagation_with_control(&network, &observed, config, control)?;
    let table = PosteriorEdgeTable::estimate(&network, &beliefs)?;
    storage::write_posterior_table(output, &table)?;

    match report {
        "json" => {
            let json = serde_json::json!({
                "config": config,
                "diagnostics": diagnostics,
                "edges": table.len(),
                "output": output.display().to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            println!(
                "✓ Wrote {} posterior edges to {}",
                table.len(),
                output.display()
            );
            println!(
                "  {} nodes, {} messages, {} sweeps (converged: {}, last delta {:.3e})",
                diagnostics.node_count,
                diagnostics.message_count,
                diagnostics.iterations_run,
                diagnostics.converged,
                diagnostics.final_max_message_delta
            );
            if network.dropped_rows() > 0 {
                println!("  {} network rows dropped", network.dropped_rows());
            }
            if let Some(summary) = table.summary() {
                println!(
                    "  posterior min {:.4}, mean {:.4}, max {:.4}",
                    summary.min, summary.mean, summary.max
                );
            }
        }
    }
    Ok(())
}

fn run_search_mu(
    network_path: &Path,
    states_path: &Path,
    modules_path: &Path,
    output: &Path,
    config: &MuSearchConfig,
    control: &RunControl,
) -> Result<(), GeneMrfError> {
    let network = storage::read_prior_network(network_path)?;
    let observed = storage::read_observed_states(states_path)?;
    let reference = storage::read_module_reference(modules_path)?;

    let scores = run_mu_search_with_control(&network, &observed, &reference, config, control)?;
    storage::write_mu_scores(output, &scores)?;

    println!("✓ Scored {} mu values\n", scores.len());
    for row in scores.rows() {
        println!("  mu = {:.6}  score = {:.6}", row.mu, row.score);
    }
    if let Some(best) = scores.best() {
        println!("\nBest: mu = {:.6} (score {:.6})", best.mu, best.score);
    }
    Ok(())
}

fn run_subnetwork(
    edges: &Path,
    gene: &str,
    threshold: f64,
    output: &Path,
    max_path_length: usize,
) -> Result<(), GeneMrfError> {
    let table = storage::read_posterior_table(edges)?;
    let subnetwork = extract_subnetwork(&table, gene, threshold, max_path_length)?;
    storage::write_posterior_table(output, &subnetwork)?;
    println!(
        "✓ Wrote {} edges around '{}' to {}",
        subnetwork.len(),
        gene,
        output.display()
    );
    Ok(())
}

fn run_encode(edges: &Path, gene_order: &Path, output: &Path) -> Result<(), GeneMrfError> {
    let encoder = GeneEncoder::from_order(storage::read_gene_order(gene_order)?);
    let encoded = encoder.encode_pairs(storage::read_headerless_pairs(edges)?);
    storage::write_encoded_pairs(output, &encoded.pairs)?;
    println!(
        "✓ Encoded {} edges ({} skipped)",
        encoded.pairs.len(),
        encoded.skipped
    );
    Ok(())
}

fn run_histogram(edges: &Path, bins: usize) -> Result<(), GeneMrfError> {
    const BAR_WIDTH: usize = 50;

    let table = storage::read_posterior_table(edges)?;
    let histogram = table.histogram(bins)?;
    let peak = histogram.counts.iter().copied().max().unwrap_or(0).max(1);

    println!("Posterior edge probabilities ({} edges)", histogram.total());
    for (k, &count) in histogram.counts.iter().enumerate() {
        let (low, high) = histogram.bounds(k);
        let bar = "#".repeat(count * BAR_WIDTH / peak);
        println!("  [{:.3}, {:.3}) {:>7} {}", low, high, count, bar);
    }
    Ok(())
}

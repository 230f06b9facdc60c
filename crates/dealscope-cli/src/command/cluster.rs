use std::path::PathBuf;

use dealscope_engine::{
    cluster,
    preprocess::{NormalizationMethod, Target},
};

use super::{PreprocessArg, RecordsArg};
use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ClusterArg {
    #[clap(flatten)]
    records: RecordsArg,
    #[clap(flatten)]
    preprocess: PreprocessArg,
    /// Number of clusters
    #[arg(short)]
    k: usize,
    #[arg(long, default_value_t = 100)]
    max_iterations: usize,
    /// Seed for reproducible initial centroids
    #[arg(long)]
    seed: Option<u64>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &ClusterArg) -> anyhow::Result<()> {
    let ClusterArg {
        records,
        preprocess,
        k,
        max_iterations,
        seed,
        output,
    } = arg;
    let data = super::load_matrix(records, preprocess, &Target::Outcome, NormalizationMethod::ZScore)?;
    let matrix = &data.matrix;

    let mut rng = dealscope_engine::seeded_rng(*seed);
    let mut result = cluster::kmeans(matrix.x(), *k, *max_iterations, matrix.dimensions(), &mut rng)?;

    // Re-profile the final memberships with outcomes to attach win rates.
    let outcomes = matrix.y().iter().map(|&y| y >= 0.5).collect::<Vec<_>>();
    let memberships = result
        .clusters
        .iter()
        .map(|c| c.members.clone())
        .collect::<Vec<_>>();
    result.clusters = cluster::analyze(
        matrix.x(),
        &memberships,
        matrix.dimensions(),
        Some(&outcomes),
    )?;

    let converged = if result.converged {
        "converged"
    } else {
        "did not converge"
    };
    eprintln!("k-means {converged} after {} iterations", result.iterations);
    for c in &result.clusters {
        let top = c
            .distinctiveness
            .first()
            .map_or("-", |d| d.dimension.as_str());
        eprintln!(
            "  Cluster {}: {} records ({:.1}%), win rate {:.3}, most distinctive: {top}",
            c.id,
            c.size,
            c.share * 100.0,
            c.win_rate.unwrap_or(0.0)
        );
    }
    util::report_warnings(&result.warnings);

    Output::save_json(&result, output.as_deref())?;
    Ok(())
}

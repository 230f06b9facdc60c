use std::path::PathBuf;

use dealscope_engine::lookup::{self, LookupOptions};

use super::RecordsArg;
use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct LookupArg {
    #[clap(flatten)]
    records: RecordsArg,
    /// Upper bound on the number of cells before domains are pruned
    #[arg(long, default_value_t = 1000)]
    max_combinations: usize,
    /// Minimum sample size of a significant cell
    #[arg(long, default_value_t = 10)]
    threshold: usize,
    /// Confidence level of the win-rate intervals
    #[arg(long)]
    confidence: Option<f64>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &LookupArg) -> anyhow::Result<()> {
    let LookupArg {
        records,
        max_combinations,
        threshold,
        confidence,
        output,
    } = arg;
    let dimensions = util::dimensions(&records.dimensions);
    let records = util::read_records_file(&records.input)?;

    let mut options = LookupOptions {
        max_combinations: *max_combinations,
        significance_threshold: *threshold,
        ..LookupOptions::default()
    };
    if let Some(level) = confidence {
        options = options.with_confidence_level(*level);
    }
    let table = lookup::generate(&records, &dimensions, &options)?;

    let significant = table.cells.iter().filter(|c| c.significant).count();
    eprintln!(
        "Generated {} cells from {} records ({significant} significant)",
        table.cells.len(),
        records.len()
    );
    if table.pruned {
        eprintln!("  Domains were pruned to stay within {max_combinations} combinations");
    }
    util::report_warnings(&table.warnings);

    Output::save_json(&table, output.as_deref())?;
    Ok(())
}

use std::path::PathBuf;

use dealscope_engine::{
    preprocess::{NormalizationMethod, Target},
    regression::{self, ImpactPolicy, RegressionOptions},
};

use super::{PreprocessArg, RecordsArg};
use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct FitRegressionArg {
    #[clap(flatten)]
    records: RecordsArg,
    #[clap(flatten)]
    preprocess: PreprocessArg,
    /// Numeric record field to explain (defaults to the won flag)
    #[arg(long)]
    target: Option<String>,
    /// Confidence level of coefficient intervals
    #[arg(long, default_value_t = 0.95)]
    confidence: f64,
    /// Impact metric: std-dev-scaled, raw or std-dev-scaled-all
    #[arg(long, default_value = "std-dev-scaled", value_parser = util::parse_enum::<ImpactPolicy>)]
    impact: ImpactPolicy,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &FitRegressionArg) -> anyhow::Result<()> {
    let FitRegressionArg {
        records,
        preprocess,
        target,
        confidence,
        impact,
        output,
    } = arg;
    let target = target.clone().map_or(Target::Outcome, Target::Field);
    let data = super::load_matrix(records, preprocess, &target, NormalizationMethod::None)?;

    let options = RegressionOptions {
        confidence_level: *confidence,
        impact_policy: *impact,
    };
    let model = regression::fit_matrix(&data.matrix, &data.encoding, &options)?;

    eprintln!("Regression fitted on {} observations", model.observations);
    eprintln!("  R²:          {:.4}", model.r_squared);
    eprintln!("  Adjusted R²: {:.4}", model.adjusted_r_squared);
    eprintln!("  F p-value:   {:.4e}", model.f_p_value);
    eprintln!("  Coefficients:");
    for c in &model.coefficients {
        eprintln!(
            "    {:<20} {:>12.4} (p = {:.4})",
            c.name, c.estimate, c.p_value
        );
    }

    Output::save_json(&model, output.as_deref())?;
    Ok(())
}

use std::path::PathBuf;

use dealscope_engine::{
    logistic::{self, TrainOptions},
    preprocess::{BalanceMethod, NormalizationMethod, Target},
};

use super::{PreprocessArg, RecordsArg};
use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    #[clap(flatten)]
    records: RecordsArg,
    #[clap(flatten)]
    preprocess: PreprocessArg,
    #[arg(long, default_value_t = 500)]
    max_iterations: usize,
    #[arg(long, default_value_t = 0.1)]
    learning_rate: f64,
    /// L2 regularization strength
    #[arg(long, default_value_t = 0.01)]
    regularization: f64,
    /// Fraction of records held out for validation
    #[arg(long, default_value_t = 0.2)]
    test_ratio: f64,
    /// Split uniformly instead of per class
    #[arg(long)]
    unstratified: bool,
    /// Class balancing of the training split: undersample or oversample
    #[arg(long, value_parser = util::parse_enum::<BalanceMethod>)]
    balance: Option<BalanceMethod>,
    /// Seed for a reproducible split
    #[arg(long)]
    seed: Option<u64>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    let TrainArg {
        records,
        preprocess,
        max_iterations,
        learning_rate,
        regularization,
        test_ratio,
        unstratified,
        balance,
        seed,
        output,
    } = arg;
    let data = super::load_matrix(records, preprocess, &Target::Outcome, NormalizationMethod::ZScore)?;

    let options = TrainOptions {
        max_iterations: *max_iterations,
        learning_rate: *learning_rate,
        regularization: *regularization,
        test_ratio: *test_ratio,
        stratified: !unstratified,
        balance: *balance,
        seed: *seed,
    };
    let mut rng = dealscope_engine::seeded_rng(*seed);
    eprintln!("Training logistic model...");
    let model = logistic::train(
        &data.matrix,
        data.encoding,
        data.normalization,
        &options,
        &mut rng,
    )?;

    let converged = if model.converged {
        "converged"
    } else {
        "did not converge"
    };
    eprintln!("Training {converged} after {} iterations", model.iterations);
    let m = &model.metrics;
    eprintln!("  Validation metrics ({} samples):", m.samples);
    eprintln!("    Accuracy:  {:.3}", m.accuracy);
    eprintln!("    Precision: {:.3}", m.precision);
    eprintln!("    Recall:    {:.3}", m.recall);
    eprintln!("    F1:        {:.3}", m.f1);
    if let Some(auc) = m.auc {
        eprintln!("    AUC:       {auc:.3}");
    }
    eprintln!("  Feature importance:");
    for f in model.feature_importance() {
        eprintln!(
            "    {:<20} {:>8.3} ({:.1}%)",
            f.dimension,
            f.weight,
            f.importance * 100.0
        );
    }

    Output::save_json(&model, output.as_deref())?;

    eprintln!();
    eprintln!("Model saved successfully");
    if let Some(path) = output {
        eprintln!("  Path: {}", path.display());
    }
    eprintln!("  Trained at: {}", model.trained_at);
    Ok(())
}

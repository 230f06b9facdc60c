use std::path::PathBuf;

use dealscope_engine::prediction::{self, CategoryThresholds, FeatureInput};

use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PredictArg {
    /// Trained model JSON file
    #[arg(long)]
    model: PathBuf,
    /// Records JSON file to score
    #[arg(long)]
    input: PathBuf,
    /// Minimum probability of the high category
    #[arg(long, default_value_t = 0.7)]
    high: f64,
    /// Minimum probability of the medium category
    #[arg(long, default_value_t = 0.4)]
    medium: f64,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &PredictArg) -> anyhow::Result<()> {
    let PredictArg {
        model,
        input,
        high,
        medium,
        output,
    } = arg;
    let model = util::read_model_file(model)?;
    let records = util::read_records_file(input)?;
    let inputs = records
        .into_iter()
        .map(|record| FeatureInput::Named(record.values))
        .collect::<Vec<_>>();
    let thresholds = CategoryThresholds {
        high: *high,
        medium: *medium,
    };

    let batch = prediction::batch_score(&model, &inputs, &thresholds)?;
    let summary = &batch.summary;
    eprintln!("Scored {} records", summary.count);
    eprintln!("  Average probability: {:.3}", summary.average_probability);
    eprintln!(
        "  High / medium / low: {} / {} / {}",
        summary.category_breakdown.high,
        summary.category_breakdown.medium,
        summary.category_breakdown.low
    );

    Output::save_json(&batch, output.as_deref())?;
    Ok(())
}

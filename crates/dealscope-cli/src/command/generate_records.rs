use std::path::PathBuf;

use dealscope_engine::{logistic::sigmoid, record::Record};
use rand::Rng;
use rand_distr::{LogNormal, Normal};

use crate::util::Output;

const SEGMENTS: [(&str, f64); 3] = [("smb", -0.3), ("mid_market", 0.2), ("enterprise", 0.6)];
const REGIONS: [(&str, f64); 3] = [("na", 0.2), ("emea", 0.0), ("apac", -0.2)];

/// Share of records whose discount is left out.
const MISSING_DISCOUNT_RATE: f64 = 0.05;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct GenerateRecordsArg {
    /// Number of records to generate
    #[arg(long, default_value_t = 500)]
    count: usize,
    /// Seed for reproducible records
    #[arg(long)]
    seed: Option<u64>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &GenerateRecordsArg) -> anyhow::Result<()> {
    let GenerateRecordsArg {
        count,
        seed,
        output,
    } = arg;
    eprintln!("Generating {count} records...");
    let mut rng = dealscope_engine::seeded_rng(*seed);
    let records = generate(*count, &mut rng)?;

    let won = records.iter().filter(|r| r.won).count();
    eprintln!("Generated {} records ({won} won)", records.len());
    Output::save_json(&records, output.as_deref())?;
    Ok(())
}

/// Draws opportunities whose outcome depends on every dimension.
///
/// Larger discounts and longer sales cycles lower the win probability;
/// enterprise deals and the `na` region raise it.
fn generate<R>(count: usize, rng: &mut R) -> anyhow::Result<Vec<Record>>
where
    R: Rng + ?Sized,
{
    let amount_dist = LogNormal::new(10.5_f64, 0.6)?;
    let discount_dist = Normal::new(0.12_f64, 0.06)?;
    let cycle_dist = Normal::new(60.0_f64, 20.0)?;

    let records = (0..count)
        .map(|i| {
            let (segment, segment_effect) = SEGMENTS[rng.random_range(0..SEGMENTS.len())];
            let (region, region_effect) = REGIONS[rng.random_range(0..REGIONS.len())];
            let amount = rng.sample(amount_dist).round();
            let discount = rng.sample(discount_dist).clamp(0.0, 0.5);
            let cycle_days = rng.sample(cycle_dist).max(5.0).round();

            let logit = -0.2 + segment_effect + region_effect - 6.0 * (discount - 0.12)
                - 0.02 * (cycle_days - 60.0);
            let won = rng.random_bool(sigmoid(logit));

            let record = Record::new(format!("opp-{i:05}"), won)
                .with("segment", segment)
                .with("region", region)
                .with("amount", amount)
                .with("salesCycleDays", cycle_days);
            if rng.random_bool(MISSING_DISCOUNT_RATE) {
                record.with_missing("discount")
            } else {
                record.with("discount", (discount * 1000.0).round() / 1000.0)
            }
        })
        .collect();
    Ok(records)
}

use std::path::PathBuf;

use dealscope_engine::formula::{self, FormulaOptions};

use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct FormulaArg {
    /// Trained model JSON file
    #[arg(long)]
    model: PathBuf,
    /// Decimal places of rendered numbers
    #[arg(long, default_value_t = 3)]
    precision: usize,
    /// Keep every term in the simplified formula
    #[arg(long)]
    no_simplify: bool,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &FormulaArg) -> anyhow::Result<()> {
    let FormulaArg {
        model,
        precision,
        no_simplify,
        output,
    } = arg;
    let model = util::read_model_file(model)?;
    let options = FormulaOptions {
        simplify: !no_simplify,
        precision: *precision,
    };
    let formula = formula::generate_formula(&model.weights, &model.dimensions, &options)?;

    eprintln!("{}", formula.simplified_formula);
    Output::save_json(&formula, output.as_deref())?;
    Ok(())
}

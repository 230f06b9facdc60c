use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::Path,
    str::FromStr,
};

use anyhow::Context;
use dealscope_engine::{
    error::Warning,
    logistic::LogisticModel,
    record::{Dimension, DimensionKind, Record},
};

/// Destination of a command's JSON result: a file, or stdout without a path.
pub struct Output {
    writer: Box<dyn Write>,
    label: String,
}

impl Output {
    pub fn save_json<T>(value: &T, output_path: Option<&Path>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        Self::open(output_path)?.write_json(value)
    }

    fn open(output_path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = output_path else {
            return Ok(Self {
                writer: Box::new(io::stdout().lock()),
                label: "stdout".to_owned(),
            });
        };
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Self {
            writer: Box::new(BufWriter::new(file)),
            label: path.display().to_string(),
        })
    }

    fn write_json<T>(&mut self, value: &T) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        serde_json::to_writer_pretty(&mut self.writer, value)
            .with_context(|| format!("Failed to write JSON to {}", self.label))?;
        writeln!(self.writer)
            .and_then(|()| self.writer.flush())
            .with_context(|| format!("Failed to flush output to {}", self.label))
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {file_kind} file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {file_kind} JSON file: {}", path.display()))
}

/// Reads a JSON array of records.
pub fn read_records_file<P>(path: P) -> anyhow::Result<Vec<Record>>
where
    P: AsRef<Path>,
{
    read_json_file("records", path)
}

pub fn read_model_file<P>(path: P) -> anyhow::Result<LogisticModel>
where
    P: AsRef<Path>,
{
    read_json_file("model", path)
}

pub fn report_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("  Warning: {warning}");
    }
}

/// Parses an option value naming an enum variant.
///
/// Accepts the JSON spelling (`z-score`, `std-dev-scaled`) as well as the
/// case-insensitive variant name (`ZScore`, `zscore`).
pub fn parse_enum<T>(s: &str) -> Result<T, String>
where
    T: serde::de::DeserializeOwned + FromStr,
{
    serde_json::from_value(serde_json::Value::String(s.to_owned()))
        .or_else(|_| s.parse())
        .map_err(|_| format!("invalid value '{s}'"))
}

/// A `--dimension` value: `name`, `name:numeric` or `name:categorical`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionArg {
    name: String,
    kind: DimensionKind,
}

#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
pub enum DimensionArgError {
    #[display("dimension name is empty")]
    EmptyName,
    #[display("unknown dimension kind '{kind}' (expected numeric or categorical)")]
    UnknownKind { kind: String },
}

impl FromStr for DimensionArg {
    type Err = DimensionArgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, kind) = match s.rsplit_once(':') {
            Some((name, kind)) => {
                let kind = kind.parse().map_err(|_| DimensionArgError::UnknownKind {
                    kind: kind.to_owned(),
                })?;
                (name, kind)
            }
            None => (s, DimensionKind::Numeric),
        };
        if name.trim().is_empty() {
            return Err(DimensionArgError::EmptyName);
        }
        Ok(Self {
            name: name.trim().to_owned(),
            kind,
        })
    }
}

impl From<&DimensionArg> for Dimension {
    fn from(arg: &DimensionArg) -> Self {
        match arg.kind {
            DimensionKind::Numeric => Dimension::numeric(&arg.name),
            DimensionKind::Categorical => Dimension::categorical(&arg.name),
        }
    }
}

pub fn dimensions(args: &[DimensionArg]) -> Vec<Dimension> {
    args.iter().map(Dimension::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse_enum {
        use dealscope_engine::{preprocess::NormalizationMethod, regression::ImpactPolicy};

        use super::*;

        #[test]
        fn test_both_spellings() {
            assert_eq!(
                parse_enum::<NormalizationMethod>("min-max"),
                Ok(NormalizationMethod::MinMax)
            );
            assert_eq!(
                parse_enum::<NormalizationMethod>("minmax"),
                Ok(NormalizationMethod::MinMax)
            );
            assert_eq!(
                parse_enum::<ImpactPolicy>("std-dev-scaled"),
                Ok(ImpactPolicy::StdDevScaled)
            );
            assert!(parse_enum::<ImpactPolicy>("scaled").is_err());
        }
    }

    mod dimension_arg {
        use super::*;

        #[test]
        fn test_bare_name_is_numeric() {
            let arg = "amount".parse::<DimensionArg>().unwrap();
            assert_eq!(Dimension::from(&arg), Dimension::numeric("amount"));
        }

        #[test]
        fn test_kind_suffix() {
            let arg = "segment:categorical".parse::<DimensionArg>().unwrap();
            assert!(Dimension::from(&arg).is_categorical());
            let arg = "days:Numeric".parse::<DimensionArg>().unwrap();
            assert!(!Dimension::from(&arg).is_categorical());
        }

        #[test]
        fn test_invalid() {
            assert!(matches!(
                "segment:ordinal".parse::<DimensionArg>(),
                Err(DimensionArgError::UnknownKind { .. })
            ));
            assert!(matches!(
                ":categorical".parse::<DimensionArg>(),
                Err(DimensionArgError::EmptyName)
            ));
        }
    }
}

use std::io::Read;

use bracket_core::{
    BracketInput, ColorRef, ConfigLifecycleManager, CreateTaxConfigInput, LifecycleError,
    TaxConfig, UpperBound,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Errors that can occur when loading bracket data.
#[derive(Debug, Error)]
pub enum BracketLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("CSV file contains no brackets")]
    Empty,

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl From<csv::Error> for BracketLoaderError {
    fn from(err: csv::Error) -> Self {
        BracketLoaderError::CsvParse(err.to_string())
    }
}

/// A single record from a bracket CSV file.
///
/// - `order`: position of the bracket, lowest first
/// - `lower`: inclusive lower bound in whole currency units
/// - `upper`: exclusive upper bound (empty for the open-ended top bracket)
/// - `rate`: marginal rate as a percentage (e.g., 32.5)
/// - `color_ref`: display color key (`DEFAULT`, `LEVEL_1`..`LEVEL_5`; empty for `DEFAULT`)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BracketRecord {
    pub order: i32,
    pub lower: i64,
    #[serde(deserialize_with = "deserialize_optional_i64")]
    pub upper: Option<i64>,
    pub rate: Decimal,
    #[serde(default, deserialize_with = "deserialize_color_ref")]
    pub color_ref: ColorRef,
}

fn deserialize_optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

fn deserialize_color_ref<'de, D>(deserializer: D) -> Result<ColorRef, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(ColorRef::Default),
        Some(code) => ColorRef::parse(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown color ref '{code}'"))),
    }
}

/// Identifying fields of the configuration a CSV file is loaded into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub financial_year_start: i32,
    pub financial_year_end: i32,
    pub version: String,
    pub last_updated: String,
    pub activate: bool,
}

/// Loader for bracket sets from CSV files.
///
/// Loading goes through [`ConfigLifecycleManager::create_with_brackets`], so
/// the rows are validated and precomputed exactly like any other new
/// configuration, whatever the storage backend.
pub struct BracketCsvLoader;

impl BracketCsvLoader {
    /// Parse bracket records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<BracketRecord>, BracketLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: BracketRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    pub fn to_inputs(records: &[BracketRecord]) -> Vec<BracketInput> {
        records
            .iter()
            .map(|record| BracketInput {
                order: record.order,
                lower: record.lower,
                upper: UpperBound::from(record.upper),
                rate: record.rate,
                color_ref: record.color_ref,
            })
            .collect()
    }

    /// Create a configuration holding `records`.
    ///
    /// Every load creates a new configuration; earlier ones are never
    /// overwritten.
    pub async fn load(
        manager: &mut ConfigLifecycleManager,
        metadata: ConfigMetadata,
        records: &[BracketRecord],
    ) -> Result<TaxConfig, BracketLoaderError> {
        if records.is_empty() {
            return Err(BracketLoaderError::Empty);
        }

        let input = CreateTaxConfigInput {
            financial_year_start: metadata.financial_year_start,
            financial_year_end: metadata.financial_year_end,
            version: metadata.version,
            last_updated: metadata.last_updated,
            is_active: Some(metadata.activate),
            brackets: Self::to_inputs(records),
        };

        let config = manager.create_with_brackets(input).await?;
        info!(
            config_id = config.id,
            brackets = config.brackets.len(),
            "Loaded bracket file"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    const TEST_CSV: &str = include_str!("../test-data/au_resident_2023_24.csv");

    #[test]
    fn test_parse_csv_single_bracket() {
        let csv = "order,lower,upper,rate,color_ref\n2,18200,45000,19,LEVEL_1";

        let records = BracketCsvLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        assert_eq!(
            records,
            vec![BracketRecord {
                order: 2,
                lower: 18_200,
                upper: Some(45_000),
                rate: dec!(19),
                color_ref: ColorRef::Level1,
            }]
        );
    }

    #[test]
    fn test_parse_csv_open_ended_upper() {
        let csv = "order,lower,upper,rate,color_ref\n5,180000,,45,LEVEL_4";

        let records = BracketCsvLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        assert_eq!(records[0].upper, None);
        assert_eq!(records[0].rate, dec!(45));
    }

    #[test]
    fn test_parse_csv_empty_color_ref_is_default() {
        let csv = "order,lower,upper,rate,color_ref\n1,0,18200,0,";

        let records = BracketCsvLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        assert_eq!(records[0].color_ref, ColorRef::Default);
    }

    #[test]
    fn test_parse_csv_trims_whitespace() {
        let csv = "order, lower, upper, rate, color_ref\n3, 45000, 120000, 32.5, LEVEL_2";

        let records = BracketCsvLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        assert_eq!(records[0].lower, 45_000);
        assert_eq!(records[0].upper, Some(120_000));
        assert_eq!(records[0].rate, dec!(32.5));
        assert_eq!(records[0].color_ref, ColorRef::Level2);
    }

    #[test]
    fn test_parse_full_file() {
        let records = BracketCsvLoader::parse(TEST_CSV.as_bytes()).expect("Failed to parse CSV");

        assert_eq!(records.len(), 5);
        let orders: Vec<i32> = records.iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5]);
        assert_eq!(records[4].upper, None);
    }

    #[test]
    fn test_parse_csv_unknown_color_ref() {
        let csv = "order,lower,upper,rate,color_ref\n1,0,18200,0,MAGENTA";

        let err = BracketCsvLoader::parse(csv.as_bytes()).expect_err("Should reject color");

        assert!(
            matches!(&err, BracketLoaderError::CsvParse(msg) if msg.contains("unknown color ref 'MAGENTA'")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_parse_csv_invalid_upper() {
        let csv = "order,lower,upper,rate,color_ref\n1,0,lots,0,DEFAULT";

        let result = BracketCsvLoader::parse(csv.as_bytes());

        assert!(matches!(result, Err(BracketLoaderError::CsvParse(_))));
    }

    #[test]
    fn test_parse_csv_missing_column() {
        let csv = "order,lower,upper\n1,0,18200";

        let result = BracketCsvLoader::parse(csv.as_bytes());

        assert!(matches!(result, Err(BracketLoaderError::CsvParse(_))));
    }

    #[test]
    fn test_to_inputs_maps_open_ended() {
        let records = BracketCsvLoader::parse(TEST_CSV.as_bytes()).expect("Failed to parse CSV");

        let inputs = BracketCsvLoader::to_inputs(&records);

        assert_eq!(
            inputs[3],
            BracketInput {
                order: 4,
                lower: 120_000,
                upper: UpperBound::Bounded(180_000),
                rate: dec!(37),
                color_ref: ColorRef::Level3,
            }
        );
        assert_eq!(inputs[4].upper, UpperBound::OpenEnded);
    }
}

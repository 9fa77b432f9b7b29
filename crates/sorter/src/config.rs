use std::collections::HashSet;
use std::path::PathBuf;

use serde::Deserialize;

use crate::{parse_calendar_instant, ParameterCode, RequestedInterval, TimelineError};

pub const DEFAULT_YEAR_START: i32 = 2021;
pub const DEFAULT_YEAR_END: i32 = 2022;

/// Contents of `sorter.toml`. Every field is optional; CLI flags are merged
/// over it before validation.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Log level: trace, debug, info, warn, error
    pub level: Option<String>,
    pub year_start: Option<i32>,
    pub year_end: Option<i32>,
    pub matcher: MatcherSettings,
    pub aligner: AlignerSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatcherSettings {
    /// Monitor metadata table (`aqs_monitors.csv`)
    pub metadata_file: PathBuf,
    /// Where the roster table is written
    pub output_file: PathBuf,
    /// Requested parameters; the first one drives station order
    pub parameter_codes: Vec<ParameterCode>,
    /// Roster column name for each requested parameter's POC
    pub poc_columns: Vec<String>,
    /// Overrides the start of the coverage window (`YYYY-MM-DD[ HH:MM]`)
    pub interval_start: Option<String>,
    /// Overrides the end of the coverage window
    pub interval_end: Option<String>,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        MatcherSettings {
            metadata_file: PathBuf::from("aqs_monitors.csv"),
            output_file: PathBuf::from("Meta_File.csv"),
            parameter_codes: vec![61103, 61104, 62101, 81102],
            poc_columns: vec![
                "POC WS".to_string(),
                "POC WD".to_string(),
                "POC TEMP".to_string(),
                "POC PM10".to_string(),
            ],
            interval_start: None,
            interval_end: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlignerSettings {
    /// Roster table produced by the matcher, possibly hand-edited
    pub roster_file: PathBuf,
    /// Directory holding `<prefix>_<year>.csv` files
    pub observation_dir: PathBuf,
    /// Archive directory
    pub output_dir: PathBuf,
    /// Roster column copied into the archive as the site name
    pub site_name_column: String,
    pub quantities: Vec<QuantitySpec>,
}

impl Default for AlignerSettings {
    fn default() -> Self {
        AlignerSettings {
            roster_file: PathBuf::from("Meta_File.csv"),
            observation_dir: PathBuf::from("EPA_FILES"),
            output_dir: PathBuf::from("EPA"),
            site_name_column: "City Name".to_string(),
            quantities: vec![
                QuantitySpec::new("WS", "WIND", "POC WS")
                    .with_parameter_name("Wind Speed - Resultant")
                    .with_unit("Knots"),
                QuantitySpec::new("WD", "WIND", "POC WD")
                    .with_parameter_name("Wind Direction - Resultant")
                    .with_unit("Degrees Compass"),
                QuantitySpec::new("TEMP", "TEMP", "POC TEMP").with_unit("Degrees Fahrenheit"),
                QuantitySpec::new("PM10", "PM10", "POC PM10")
                    .with_unit("Micrograms/cubic meter (25 C)"),
            ],
        }
    }
}

/// One measured quantity exported by the aligner.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct QuantitySpec {
    /// Archive name, also the Parquet file stem
    pub name: String,
    pub file_prefix: String,
    pub poc_column: String,
    /// Restricts rows to this `Parameter Name` label when a file mixes
    /// several quantities
    #[serde(default)]
    pub parameter_name: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Roster column whose first-row value is the unit
    #[serde(default)]
    pub unit_column: Option<String>,
}

impl QuantitySpec {
    pub fn new(name: &str, file_prefix: &str, poc_column: &str) -> Self {
        QuantitySpec {
            name: name.to_string(),
            file_prefix: file_prefix.to_string(),
            poc_column: poc_column.to_string(),
            parameter_name: None,
            unit: None,
            unit_column: None,
        }
    }

    pub fn with_parameter_name(mut self, label: &str) -> Self {
        self.parameter_name = Some(label.to_string());
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn with_unit_column(mut self, column: &str) -> Self {
        self.unit_column = Some(column.to_string());
        self
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error(transparent)]
    Years(#[from] TimelineError),
    #[error("no parameter codes configured")]
    NoParameters,
    #[error("{codes} parameter codes but {columns} POC columns configured")]
    ColumnCountMismatch { codes: usize, columns: usize },
    #[error("POC column '{0}' is configured more than once")]
    DuplicateColumn(String),
    #[error("POC column name must not be empty")]
    EmptyColumn,
    #[error("'{field}' is not a valid date: '{value}'")]
    InvalidDate { field: &'static str, value: String },
    #[error("interval start {start} is after its end {end}")]
    InvertedInterval { start: String, end: String },
    #[error("no quantities configured for the aligner")]
    NoQuantities,
    #[error("quantity '{0}' is configured more than once")]
    DuplicateQuantity(String),
    #[error("quantity '{name}' has an invalid {field}")]
    InvalidQuantity { name: String, field: &'static str },
    #[error("site name column must not be empty")]
    EmptySiteNameColumn,
}

/// A requested parameter and the roster column holding its POC.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedParameter {
    pub code: ParameterCode,
    pub poc_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    pub metadata_file: PathBuf,
    pub output_file: PathBuf,
    pub parameters: Vec<RequestedParameter>,
    pub interval: RequestedInterval,
}

impl MatcherConfig {
    pub fn poc_columns(&self) -> Vec<String> {
        self.parameters
            .iter()
            .map(|p| p.poc_column.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignerConfig {
    pub roster_file: PathBuf,
    pub observation_dir: PathBuf,
    pub output_dir: PathBuf,
    pub site_name_column: String,
    pub quantities: Vec<QuantitySpec>,
}

/// Validated settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub year_start: i32,
    pub year_end: i32,
    pub matcher: MatcherConfig,
    pub aligner: AlignerConfig,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let year_start = settings.year_start.unwrap_or(DEFAULT_YEAR_START);
        let year_end = settings.year_end.unwrap_or(DEFAULT_YEAR_END);
        let default_interval = RequestedInterval::for_years(year_start, year_end)?;

        Ok(PipelineConfig {
            year_start,
            year_end,
            matcher: validate_matcher(&settings.matcher, default_interval)?,
            aligner: validate_aligner(&settings.aligner)?,
        })
    }
}

fn validate_matcher(
    matcher: &MatcherSettings,
    default_interval: RequestedInterval,
) -> Result<MatcherConfig, ConfigError> {
    if matcher.parameter_codes.is_empty() {
        return Err(ConfigError::NoParameters);
    }
    if matcher.parameter_codes.len() != matcher.poc_columns.len() {
        return Err(ConfigError::ColumnCountMismatch {
            codes: matcher.parameter_codes.len(),
            columns: matcher.poc_columns.len(),
        });
    }
    let mut seen = HashSet::new();
    for column in &matcher.poc_columns {
        if column.trim().is_empty() {
            return Err(ConfigError::EmptyColumn);
        }
        if !seen.insert(column.trim()) {
            return Err(ConfigError::DuplicateColumn(column.clone()));
        }
    }

    let start = match &matcher.interval_start {
        Some(raw) => parse_interval_bound("interval_start", raw)?,
        None => default_interval.start,
    };
    let end = match &matcher.interval_end {
        Some(raw) => parse_interval_bound("interval_end", raw)?,
        None => default_interval.end,
    };
    if start > end {
        return Err(ConfigError::InvertedInterval {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    Ok(MatcherConfig {
        metadata_file: matcher.metadata_file.clone(),
        output_file: matcher.output_file.clone(),
        parameters: matcher
            .parameter_codes
            .iter()
            .zip(&matcher.poc_columns)
            .map(|(code, column)| RequestedParameter {
                code: *code,
                poc_column: column.trim().to_string(),
            })
            .collect(),
        interval: RequestedInterval::new(start, end),
    })
}

fn parse_interval_bound(
    field: &'static str,
    raw: &str,
) -> Result<time::PrimitiveDateTime, ConfigError> {
    parse_calendar_instant(raw).ok_or_else(|| ConfigError::InvalidDate {
        field,
        value: raw.to_string(),
    })
}

fn validate_aligner(aligner: &AlignerSettings) -> Result<AlignerConfig, ConfigError> {
    if aligner.quantities.is_empty() {
        return Err(ConfigError::NoQuantities);
    }
    if aligner.site_name_column.trim().is_empty() {
        return Err(ConfigError::EmptySiteNameColumn);
    }

    let mut names = HashSet::new();
    let mut quantities = Vec::with_capacity(aligner.quantities.len());
    for quantity in &aligner.quantities {
        let invalid = |field| ConfigError::InvalidQuantity {
            name: quantity.name.clone(),
            field,
        };
        // the name becomes a file stem in the archive directory
        let name = quantity.name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "timeline" || name == "stations"
        {
            return Err(invalid("name"));
        }
        if quantity.file_prefix.trim().is_empty() {
            return Err(invalid("file_prefix"));
        }
        if quantity.poc_column.trim().is_empty() {
            return Err(invalid("poc_column"));
        }
        let unit_column = quantity.unit_column.as_deref().map(str::trim);
        if unit_column.is_some_and(str::is_empty) {
            return Err(invalid("unit_column"));
        }
        if !names.insert(name) {
            return Err(ConfigError::DuplicateQuantity(quantity.name.clone()));
        }

        quantities.push(QuantitySpec {
            name: name.to_string(),
            file_prefix: quantity.file_prefix.trim().to_string(),
            poc_column: quantity.poc_column.trim().to_string(),
            parameter_name: quantity
                .parameter_name
                .as_deref()
                .map(|label| label.trim().to_string()),
            unit: quantity.unit.clone(),
            unit_column: unit_column.map(str::to_string),
        });
    }

    Ok(AlignerConfig {
        roster_file: aligner.roster_file.clone(),
        observation_dir: aligner.observation_dir.clone(),
        output_dir: aligner.output_dir.clone(),
        site_name_column: aligner.site_name_column.trim().to_string(),
        quantities,
    })
}

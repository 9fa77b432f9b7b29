use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use aqs_sorter_core::ensure_parent_dir;
use csv::StringRecord;

use crate::{
    normalize_code, parse_gmt_timestamp, parse_last_sample, parse_optional_f64,
    parse_parameter_code, parse_poc, parse_year_start, MetadataRecord, ObservationRecord, Poc,
    SiteInfo, StationKey, StationRoster, WantedInstruments,
};

pub const STATE_CODE: &str = "State Code";
pub const COUNTY_CODE: &str = "County Code";
pub const SITE_NUMBER: &str = "Site Number";
pub const LATITUDE: &str = "Latitude";
pub const LONGITUDE: &str = "Longitude";
pub const STATE_NAME: &str = "State Name";
pub const COUNTY_NAME: &str = "County Name";
pub const CITY_NAME: &str = "City Name";

#[derive(thiserror::Error, Debug)]
pub enum TableError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is missing required column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: String },
    #[error("failed to read {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{} line {line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: u64,
        reason: String,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("roster has {expected} parameters but {found} POC columns were given")]
    ColumnCount { expected: usize, found: usize },
}

/// Header positions of the columns a reader needs.
struct Columns<'p> {
    path: &'p Path,
    indices: HashMap<String, usize>,
}

impl<'p> Columns<'p> {
    fn new(path: &'p Path, headers: &StringRecord) -> Self {
        let mut indices = HashMap::new();
        for (idx, name) in headers.iter().enumerate() {
            // first occurrence wins on repeated headers
            indices.entry(name.trim().to_string()).or_insert(idx);
        }
        Columns { path, indices }
    }

    fn require(&self, column: &str) -> Result<usize, TableError> {
        self.indices
            .get(column)
            .copied()
            .ok_or_else(|| TableError::MissingColumn {
                path: self.path.to_path_buf(),
                column: column.to_string(),
            })
    }
}

fn cell(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).map(str::trim).unwrap_or_default()
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|pos| pos.line()).unwrap_or_default()
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>, TableError> {
    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file))
}

fn read_headers(reader: &mut csv::Reader<File>, path: &Path) -> Result<StringRecord, TableError> {
    reader
        .headers()
        .cloned()
        .map_err(|source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

/// Parsed monitor metadata plus the number of rows that had to be skipped
/// because their station, POC or parameter code was unusable.
#[derive(Debug, Default)]
pub struct MetadataTable {
    pub records: Vec<MetadataRecord>,
    pub skipped: usize,
}

pub fn read_metadata_table(path: &Path) -> Result<MetadataTable, TableError> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let columns = Columns::new(path, &headers);

    let state = columns.require(STATE_CODE)?;
    let county = columns.require(COUNTY_CODE)?;
    let site = columns.require(SITE_NUMBER)?;
    let poc = columns.require("POC")?;
    let code = columns.require("Parameter Code")?;
    let name = columns.require("Parameter Name")?;
    let first_year = columns.require("First Year of Data")?;
    let last_sample = columns.require("Last Sample Date")?;
    let latitude = columns.require(LATITUDE)?;
    let longitude = columns.require(LONGITUDE)?;
    let state_name = columns.require(STATE_NAME)?;
    let county_name = columns.require(COUNTY_NAME)?;
    let city_name = columns.require(CITY_NAME)?;

    let mut table = MetadataTable::default();
    for row in reader.records() {
        let row = row.map_err(|source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

        let station = StationKey::parse(cell(&row, state), cell(&row, county), cell(&row, site));
        let (Some(station), Some(poc), Some(parameter_code)) = (
            station,
            parse_poc(cell(&row, poc)),
            parse_parameter_code(cell(&row, code)),
        ) else {
            table.skipped += 1;
            continue;
        };

        table.records.push(MetadataRecord {
            station,
            parameter_code,
            parameter_name: cell(&row, name).to_string(),
            poc,
            coverage_start: parse_year_start(cell(&row, first_year)),
            coverage_end: parse_last_sample(cell(&row, last_sample)),
            site: SiteInfo {
                latitude: parse_optional_f64(cell(&row, latitude)),
                longitude: parse_optional_f64(cell(&row, longitude)),
                state_name: cell(&row, state_name).to_string(),
                county_name: cell(&row, county_name).to_string(),
                city_name: cell(&row, city_name).to_string(),
            },
        });
    }
    Ok(table)
}

/// Write the sparse roster table, one POC column per requested parameter in
/// `poc_columns` order. Returns the number of data rows written.
pub fn write_roster_table(
    path: &Path,
    roster: &StationRoster,
    poc_columns: &[String],
) -> Result<usize, TableError> {
    if poc_columns.len() != roster.parameter_count() {
        return Err(TableError::ColumnCount {
            expected: roster.parameter_count(),
            found: poc_columns.len(),
        });
    }
    ensure_parent_dir(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let write_err = |source: csv::Error| TableError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(write_err)?;

    let mut header = vec![STATE_CODE, COUNTY_CODE, SITE_NUMBER];
    header.extend(poc_columns.iter().map(String::as_str));
    header.extend([LATITUDE, LONGITUDE, STATE_NAME, COUNTY_NAME, CITY_NAME]);
    writer.write_record(&header).map_err(write_err)?;

    let rows = roster.rows();
    for row in &rows {
        let mut line = vec![
            row.station.state_code.clone(),
            row.station.county_code.clone(),
            row.station.site_number.clone(),
        ];
        line.extend(
            row.pocs
                .iter()
                .map(|poc| poc.map(|p| p.to_string()).unwrap_or_default()),
        );
        match &row.site {
            Some(site) => line.extend([
                site.latitude.map(|v| v.to_string()).unwrap_or_default(),
                site.longitude.map(|v| v.to_string()).unwrap_or_default(),
                site.state_name.clone(),
                site.county_name.clone(),
                site.city_name.clone(),
            ]),
            None => line.extend(std::iter::repeat(String::new()).take(5)),
        }
        writer.write_record(&line).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|source| write_err(csv::Error::from(source)))?;
    Ok(rows.len())
}

/// One line of a roster table as seen by the aligner.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterTableRow {
    pub station: StationKey,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pocs: HashMap<String, Option<Poc>>,
    text: HashMap<String, String>,
}

impl RosterTableRow {
    /// Instrument in `column`, `None` for an empty cell or unknown column.
    pub fn poc(&self, column: &str) -> Option<Poc> {
        self.pocs.get(column).copied().flatten()
    }

    pub fn text(&self, column: &str) -> &str {
        self.text.get(column).map(String::as_str).unwrap_or_default()
    }
}

/// Read a roster table. Every column in `poc_columns` and `text_columns` must
/// exist; non-empty POC cells must parse.
pub fn read_roster_table(
    path: &Path,
    poc_columns: &[&str],
    text_columns: &[&str],
) -> Result<Vec<RosterTableRow>, TableError> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let columns = Columns::new(path, &headers);

    let state = columns.require(STATE_CODE)?;
    let county = columns.require(COUNTY_CODE)?;
    let site = columns.require(SITE_NUMBER)?;
    let latitude = columns.require(LATITUDE)?;
    let longitude = columns.require(LONGITUDE)?;
    let poc_idx = poc_columns
        .iter()
        .map(|name| Ok((name.to_string(), columns.require(name)?)))
        .collect::<Result<Vec<_>, TableError>>()?;
    let text_idx = text_columns
        .iter()
        .map(|name| Ok((name.to_string(), columns.require(name)?)))
        .collect::<Result<Vec<_>, TableError>>()?;

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let malformed = |reason: String| TableError::Malformed {
            path: path.to_path_buf(),
            line: line_of(&row),
            reason,
        };

        let station = StationKey::parse(cell(&row, state), cell(&row, county), cell(&row, site))
            .ok_or_else(|| malformed("station code is empty".to_string()))?;

        let mut pocs = HashMap::with_capacity(poc_idx.len());
        for (name, idx) in &poc_idx {
            let raw = cell(&row, *idx);
            let poc = match normalize_code(raw) {
                None => None,
                Some(_) => Some(
                    parse_poc(raw)
                        .ok_or_else(|| malformed(format!("'{}' is not a POC: {}", name, raw)))?,
                ),
            };
            pocs.insert(name.clone(), poc);
        }
        let text = text_idx
            .iter()
            .map(|(name, idx)| (name.clone(), cell(&row, *idx).to_string()))
            .collect();

        rows.push(RosterTableRow {
            station,
            latitude: parse_optional_f64(cell(&row, latitude)),
            longitude: parse_optional_f64(cell(&row, longitude)),
            pocs,
            text,
        });
    }
    Ok(rows)
}

/// Rows of a yearly observation file that belong to a wanted instrument.
///
/// Rows of other instruments are skipped without being parsed further, as are
/// rows with an empty measurement. A wanted row with an unparseable
/// measurement or timestamp fails the whole file.
pub fn read_observation_file(
    path: &Path,
    wanted: &WantedInstruments,
) -> Result<Vec<ObservationRecord>, TableError> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let columns = Columns::new(path, &headers);

    let state = columns.require(STATE_CODE)?;
    let county = columns.require(COUNTY_CODE)?;
    let site = columns.require("Site Num")?;
    let poc = columns.require("POC")?;
    let name = columns.require("Parameter Name")?;
    let measurement = columns.require("Sample Measurement")?;
    let date = columns.require("Date GMT")?;
    let time = columns.require("Time GMT")?;

    let mut observations = Vec::new();
    let mut row = StringRecord::new();
    loop {
        let more = reader
            .read_record(&mut row)
            .map_err(|source| TableError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        if !more {
            break;
        }

        let Some(station) =
            StationKey::parse(cell(&row, state), cell(&row, county), cell(&row, site))
        else {
            continue;
        };
        let Some(poc) = parse_poc(cell(&row, poc)) else {
            continue;
        };
        if !wanted.contains(&station, poc) {
            continue;
        }

        let malformed = |reason: String| TableError::Malformed {
            path: path.to_path_buf(),
            line: line_of(&row),
            reason,
        };
        let raw_value = cell(&row, measurement);
        if raw_value.is_empty() || raw_value.eq_ignore_ascii_case("nan") {
            continue;
        }
        let value = parse_optional_f64(raw_value)
            .ok_or_else(|| malformed(format!("measurement '{}' is not a number", raw_value)))?;
        let timestamp = parse_gmt_timestamp(cell(&row, date), cell(&row, time)).ok_or_else(|| {
            malformed(format!(
                "bad GMT timestamp '{} {}'",
                cell(&row, date),
                cell(&row, time)
            ))
        })?;

        observations.push(ObservationRecord {
            station,
            poc,
            parameter_name: cell(&row, name).to_string(),
            timestamp,
            value,
        });
    }
    Ok(observations)
}

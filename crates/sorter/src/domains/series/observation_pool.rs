use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use aqs_sorter_core::yearly_file_path;

use crate::{
    extract_series, read_observation_file, ObservationRecord, Poc, SeriesPoint, StationKey,
    TableError,
};

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("yearly file for '{prefix}' {year} not found at {}", path.display())]
    MissingFile {
        prefix: String,
        year: i32,
        path: PathBuf,
    },
    #[error("yearly file for '{prefix}' {year} is unreadable: {source}")]
    Unreadable {
        prefix: String,
        year: i32,
        #[source]
        source: TableError,
    },
}

/// Instruments whose rows are worth keeping while scanning a yearly file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WantedInstruments {
    by_station: HashMap<StationKey, HashSet<Poc>>,
}

impl WantedInstruments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, station: StationKey, poc: Poc) {
        self.by_station.entry(station).or_default().insert(poc);
    }

    pub fn contains(&self, station: &StationKey, poc: Poc) -> bool {
        self.by_station
            .get(station)
            .is_some_and(|pocs| pocs.contains(&poc))
    }

    pub fn len(&self) -> usize {
        self.by_station.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_station.is_empty()
    }
}

/// Source of yearly observation tables, one per (file prefix, year).
#[cfg_attr(test, mockall::automock)]
pub trait ObservationSource {
    /// Rows of `<prefix>_<year>` belonging to a wanted instrument, in file order.
    fn read_year(
        &self,
        prefix: &str,
        year: i32,
        wanted: &WantedInstruments,
    ) -> Result<Vec<ObservationRecord>, ExtractError>;
}

/// Yearly CSV files named `<prefix>_<year>.csv` in one directory.
pub struct CsvYearlyFiles {
    dir: PathBuf,
}

impl CsvYearlyFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CsvYearlyFiles { dir: dir.into() }
    }
}

impl ObservationSource for CsvYearlyFiles {
    fn read_year(
        &self,
        prefix: &str,
        year: i32,
        wanted: &WantedInstruments,
    ) -> Result<Vec<ObservationRecord>, ExtractError> {
        let path = yearly_file_path(&self.dir, prefix, year);
        if !path.is_file() {
            return Err(ExtractError::MissingFile {
                prefix: prefix.to_string(),
                year,
                path,
            });
        }
        read_observation_file(&path, wanted).map_err(|source| ExtractError::Unreadable {
            prefix: prefix.to_string(),
            year,
            source,
        })
    }
}

/// Observations of the wanted instruments pooled across years, per
/// (station, POC), in the order they were read.
#[derive(Debug, Default)]
pub struct ObservationPool {
    by_instrument: HashMap<(StationKey, Poc), Vec<ObservationRecord>>,
    total: usize,
}

impl ObservationPool {
    pub fn push(&mut self, record: ObservationRecord) {
        self.total += 1;
        self.by_instrument
            .entry((record.station.clone(), record.poc))
            .or_default()
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Series of one instrument, optionally restricted to a parameter label.
    pub fn series(
        &self,
        station: &StationKey,
        poc: Poc,
        parameter_filter: Option<&str>,
    ) -> Vec<SeriesPoint> {
        match self.by_instrument.get(&(station.clone(), poc)) {
            Some(records) => extract_series(records, station, poc, parameter_filter),
            None => Vec::new(),
        }
    }
}

/// Read every year in `years` for `prefix` and pool the wanted rows.
///
/// Any missing or malformed year fails the whole load.
pub fn load_pool(
    source: &dyn ObservationSource,
    prefix: &str,
    years: (i32, i32),
    wanted: &WantedInstruments,
) -> Result<ObservationPool, ExtractError> {
    let mut pool = ObservationPool::default();
    for year in years.0..=years.1 {
        for record in source.read_year(prefix, year, wanted)? {
            pool.push(record);
        }
    }
    Ok(pool)
}

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aqs_sorter_core::ensure_dir_exists;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::format::KeyValue;
use parquet::record::RecordWriter;
use parquet::{
    basic::{LogicalType, Repetition, Type as PhysicalType},
    schema::types::Type,
};
use parquet_derive::ParquetRecordWriter;
use slog::{debug, info, Logger};
use time::macros::format_description;

use crate::{AlignedSeries, HourlyTimeline, StationKey, MISSING_VALUE_SENTINEL};

pub const TIMELINE_FILE: &str = "timeline.parquet";
pub const STATIONS_FILE: &str = "stations.parquet";

#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("failed to create {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write parquet file {}: {source}", path.display())]
    Parquet {
        path: PathBuf,
        #[source]
        source: ParquetError,
    },
    #[error("failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("quantity '{name}' has {found} series for {expected} stations")]
    StationCount {
        name: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, ParquetRecordWriter)]
pub struct TimelineRow {
    pub time_index: i64,
    pub date: f64,
    pub timestamp: String,
}

#[derive(Debug, ParquetRecordWriter)]
pub struct StationRow {
    pub station_index: i64,
    pub state_code: String,
    pub county_code: String,
    pub site_number: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub site_name: String,
}

#[derive(Debug, ParquetRecordWriter)]
pub struct SeriesValueRow {
    pub station_index: i64,
    pub time_index: i64,
    pub value: f64,
}

/// Station passthrough written next to the series.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveStation {
    pub station: StationKey,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub site_name: String,
}

/// One quantity's stations x timeline array, ready to be written.
#[derive(Debug, Clone)]
pub struct QuantityArchive {
    pub name: String,
    pub unit: String,
    pub parameter_name: Option<String>,
    /// One series per archive station, in station order
    pub series: Vec<AlignedSeries>,
}

fn string_column(name: &str) -> Result<Type, ParquetError> {
    Type::primitive_type_builder(name, PhysicalType::BYTE_ARRAY)
        .with_repetition(Repetition::REQUIRED)
        .with_logical_type(Some(LogicalType::String))
        .build()
}

fn column(name: &str, physical: PhysicalType, repetition: Repetition) -> Result<Type, ParquetError> {
    Type::primitive_type_builder(name, physical)
        .with_repetition(repetition)
        .build()
}

pub fn create_timeline_schema() -> Result<Type, ParquetError> {
    Type::group_type_builder("timeline")
        .with_fields(vec![
            Arc::new(column("time_index", PhysicalType::INT64, Repetition::REQUIRED)?),
            Arc::new(column("date", PhysicalType::DOUBLE, Repetition::REQUIRED)?),
            Arc::new(string_column("timestamp")?),
        ])
        .build()
}

pub fn create_station_schema() -> Result<Type, ParquetError> {
    Type::group_type_builder("station")
        .with_fields(vec![
            Arc::new(column("station_index", PhysicalType::INT64, Repetition::REQUIRED)?),
            Arc::new(string_column("state_code")?),
            Arc::new(string_column("county_code")?),
            Arc::new(string_column("site_number")?),
            Arc::new(column("latitude", PhysicalType::DOUBLE, Repetition::OPTIONAL)?),
            Arc::new(column("longitude", PhysicalType::DOUBLE, Repetition::OPTIONAL)?),
            Arc::new(string_column("site_name")?),
        ])
        .build()
}

pub fn create_series_schema() -> Result<Type, ParquetError> {
    Type::group_type_builder("series")
        .with_fields(vec![
            Arc::new(column("station_index", PhysicalType::INT64, Repetition::REQUIRED)?),
            Arc::new(column("time_index", PhysicalType::INT64, Repetition::REQUIRED)?),
            Arc::new(column("value", PhysicalType::DOUBLE, Repetition::REQUIRED)?),
        ])
        .build()
}

/// Writes the aligned archive: a shared timeline, the station table and one
/// file per quantity.
pub struct ArchiveWriter {
    logger: Logger,
    output_dir: PathBuf,
}

impl ArchiveWriter {
    pub fn create(logger: Logger, output_dir: &Path) -> Result<Self, ArchiveError> {
        ensure_dir_exists(output_dir).map_err(|source| ArchiveError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;
        Ok(ArchiveWriter {
            logger,
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn quantity_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.parquet", name))
    }

    pub fn write_timeline(&self, timeline: &HourlyTimeline) -> Result<PathBuf, ArchiveError> {
        let iso = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
        let rows = timeline
            .timestamps()
            .zip(timeline.linear_days())
            .enumerate()
            .map(|(slot, (at, date))| -> Result<TimelineRow, ArchiveError> {
                Ok(TimelineRow {
                    time_index: slot as i64,
                    date,
                    timestamp: at.format(iso)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let path = self.output_dir.join(TIMELINE_FILE);
        self.write_file(&path, create_timeline_schema, Vec::new(), [rows.as_slice()])?;
        info!(self.logger, "wrote {} timeline slots to {}", rows.len(), path.display());
        Ok(path)
    }

    pub fn write_stations(&self, stations: &[ArchiveStation]) -> Result<PathBuf, ArchiveError> {
        let rows: Vec<StationRow> = stations
            .iter()
            .enumerate()
            .map(|(idx, station)| StationRow {
                station_index: idx as i64,
                state_code: station.station.state_code.clone(),
                county_code: station.station.county_code.clone(),
                site_number: station.station.site_number.clone(),
                latitude: station.latitude,
                longitude: station.longitude,
                site_name: station.site_name.clone(),
            })
            .collect();

        let path = self.output_dir.join(STATIONS_FILE);
        self.write_file(&path, create_station_schema, Vec::new(), [rows.as_slice()])?;
        info!(self.logger, "wrote {} stations to {}", rows.len(), path.display());
        Ok(path)
    }

    /// Write one quantity, one row group per station.
    pub fn write_quantity(
        &self,
        quantity: &QuantityArchive,
        station_count: usize,
    ) -> Result<PathBuf, ArchiveError> {
        if quantity.series.len() != station_count {
            return Err(ArchiveError::StationCount {
                name: quantity.name.clone(),
                expected: station_count,
                found: quantity.series.len(),
            });
        }

        let mut metadata = vec![
            KeyValue::new("quantity".to_string(), quantity.name.clone()),
            KeyValue::new("unit".to_string(), quantity.unit.clone()),
            KeyValue::new("sentinel".to_string(), MISSING_VALUE_SENTINEL.to_string()),
        ];
        if let Some(label) = &quantity.parameter_name {
            metadata.push(KeyValue::new("parameter_name".to_string(), label.clone()));
        }

        let groups: Vec<Vec<SeriesValueRow>> = quantity
            .series
            .iter()
            .enumerate()
            .map(|(station_index, series)| {
                series
                    .to_sentinel_values()
                    .into_iter()
                    .enumerate()
                    .map(|(slot, value)| SeriesValueRow {
                        station_index: station_index as i64,
                        time_index: slot as i64,
                        value,
                    })
                    .collect()
            })
            .collect();

        let path = self.quantity_path(&quantity.name);
        self.write_file(
            &path,
            create_series_schema,
            metadata,
            groups.iter().map(Vec::as_slice),
        )?;
        info!(
            self.logger,
            "wrote {} ({}) for {} stations to {}",
            quantity.name,
            quantity.unit,
            station_count,
            path.display()
        );
        Ok(path)
    }

    fn write_file<'r, R>(
        &self,
        path: &Path,
        schema: fn() -> Result<Type, ParquetError>,
        metadata: Vec<KeyValue>,
        row_groups: impl IntoIterator<Item = &'r [R]>,
    ) -> Result<(), ArchiveError>
    where
        R: 'r,
        &'r [R]: RecordWriter<R>,
    {
        let parquet_err = |source| ArchiveError::Parquet {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let props = WriterProperties::builder()
            .set_key_value_metadata((!metadata.is_empty()).then_some(metadata))
            .build();
        let mut writer =
            SerializedFileWriter::new(file, Arc::new(schema().map_err(parquet_err)?), Arc::new(props))
                .map_err(parquet_err)?;

        for rows in row_groups {
            let mut row_group = writer.next_row_group().map_err(parquet_err)?;
            rows.write_to_row_group(&mut row_group)
                .map_err(parquet_err)?;
            row_group.close().map_err(parquet_err)?;
            debug!(self.logger, "wrote row group of {} rows", rows.len());
        }
        writer.close().map_err(parquet_err)?;
        Ok(())
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Error};
use slog::{debug, error, info, warn, Logger};

use crate::{
    align_to_timeline, build_hourly_timeline, find_qualifying, intersect_stations, load_pool,
    read_metadata_table, read_roster_table, write_roster_table, AlignedSeries, ArchiveStation,
    ArchiveWriter, CsvYearlyFiles, ExtractError, HourlyTimeline, ObservationSource,
    ParameterCode, PipelineConfig, QuantityArchive, QuantitySpec, RosterTableRow,
    WantedInstruments,
};

/// Outcome of a matcher run.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSummary {
    /// Qualifying metadata records per requested parameter
    pub candidates: Vec<(ParameterCode, usize)>,
    pub stations: usize,
    pub rows: usize,
    pub skipped_metadata_rows: usize,
    pub output_file: PathBuf,
}

/// Read the metadata table, intersect the qualifying stations and write the
/// roster table. Nothing is written when no station qualifies.
pub fn run_matcher(config: &PipelineConfig, logger: &Logger) -> Result<MatchSummary, Error> {
    let matcher = &config.matcher;
    info!(
        logger,
        "reading monitor metadata from {}",
        matcher.metadata_file.display()
    );
    let table = read_metadata_table(&matcher.metadata_file)?;
    if table.skipped > 0 {
        warn!(
            logger,
            "skipped {} metadata rows without a usable station, POC or parameter code",
            table.skipped
        );
    }
    debug!(logger, "metadata records: {}", table.records.len());

    let mut candidates = Vec::with_capacity(matcher.parameters.len());
    let per_parameter: Vec<_> = matcher
        .parameters
        .iter()
        .map(|parameter| {
            let matches = find_qualifying(&table.records, parameter.code, &matcher.interval);
            info!(
                logger,
                "parameter {} ({}): {} qualifying instruments",
                parameter.code,
                parameter.poc_column,
                matches.len()
            );
            candidates.push((parameter.code, matches.len()));
            matches
        })
        .collect();

    let roster = intersect_stations(&per_parameter, &matcher.interval)?;
    info!(
        logger,
        "{} stations report all {} parameters over {}",
        roster.station_count(),
        matcher.parameters.len(),
        matcher.interval
    );

    let rows = write_roster_table(&matcher.output_file, &roster, &matcher.poc_columns())?;
    info!(
        logger,
        "wrote {} roster rows to {}",
        rows,
        matcher.output_file.display()
    );

    Ok(MatchSummary {
        candidates,
        stations: roster.station_count(),
        rows,
        skipped_metadata_rows: table.skipped,
        output_file: matcher.output_file.clone(),
    })
}

/// Extracts aligned series for groups of quantities sharing a file prefix.
pub struct SeriesService {
    pub logger: Logger,
    pub source: Arc<dyn ObservationSource>,
}

impl SeriesService {
    pub fn new(logger: Logger, source: Arc<dyn ObservationSource>) -> Self {
        SeriesService { logger, source }
    }

    /// Read every year of `prefix` once and align each quantity of the group
    /// for every roster row. A row with an empty POC cell gets an all-missing
    /// series.
    pub fn extract_group(
        &self,
        prefix: &str,
        quantities: &[&QuantitySpec],
        rows: &[RosterTableRow],
        timeline: &HourlyTimeline,
    ) -> Result<Vec<QuantityArchive>, ExtractError> {
        let mut wanted = WantedInstruments::new();
        for quantity in quantities {
            for row in rows {
                if let Some(poc) = row.poc(&quantity.poc_column) {
                    wanted.insert(row.station.clone(), poc);
                }
            }
        }
        info!(
            self.logger,
            "reading {} files for {} instruments", prefix,
            wanted.len()
        );

        let pool = load_pool(self.source.as_ref(), prefix, timeline.years(), &wanted)?;
        debug!(self.logger, "{}: {} observations pooled", prefix, pool.len());

        let archives = quantities
            .iter()
            .map(|quantity| {
                let filter = quantity.parameter_name.as_deref();
                let series: Vec<AlignedSeries> = rows
                    .iter()
                    .map(|row| match row.poc(&quantity.poc_column) {
                        Some(poc) => align_to_timeline(
                            &pool.series(&row.station, poc, filter),
                            timeline,
                        ),
                        None => AlignedSeries::missing(timeline.len()),
                    })
                    .collect();
                self.log_diagnostics(quantity, &series);

                QuantityArchive {
                    name: quantity.name.clone(),
                    unit: unit_of(quantity, rows),
                    parameter_name: quantity.parameter_name.clone(),
                    series,
                }
            })
            .collect();
        Ok(archives)
    }

    fn log_diagnostics(&self, quantity: &QuantitySpec, series: &[AlignedSeries]) {
        let observed: usize = series.iter().map(AlignedSeries::observed_count).sum();
        let duplicates: usize = series.iter().map(AlignedSeries::duplicates_dropped).sum();
        let outside: usize = series.iter().map(AlignedSeries::outside_timeline).sum();
        info!(
            self.logger,
            "{}: {} hourly values placed across {} stations",
            quantity.name,
            observed,
            series.len()
        );
        if duplicates > 0 {
            warn!(
                self.logger,
                "{}: dropped {} readings sharing an hour with an earlier one", quantity.name, duplicates
            );
        }
        if outside > 0 {
            debug!(
                self.logger,
                "{}: {} readings fell outside the timeline", quantity.name, outside
            );
        }
    }
}

/// Literal unit, else the first roster row's unit column, else empty.
fn unit_of(quantity: &QuantitySpec, rows: &[RosterTableRow]) -> String {
    if let Some(unit) = &quantity.unit {
        return unit.clone();
    }
    match (&quantity.unit_column, rows.first()) {
        (Some(column), Some(first)) => first.text(column).to_string(),
        _ => String::new(),
    }
}

/// Quantities grouped by file prefix, in first-appearance order.
fn group_by_prefix(quantities: &[QuantitySpec]) -> Vec<(&str, Vec<&QuantitySpec>)> {
    let mut groups: Vec<(&str, Vec<&QuantitySpec>)> = Vec::new();
    for quantity in quantities {
        let prefix = quantity.file_prefix.trim();
        match groups.iter_mut().find(|(p, _)| *p == prefix) {
            Some((_, members)) => members.push(quantity),
            None => groups.push((prefix, vec![quantity])),
        }
    }
    groups
}

/// Outcome of an aligner run.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignSummary {
    pub stations: usize,
    pub timeline_len: usize,
    pub extracted: Vec<String>,
    /// Quantity name and the reason it could not be extracted
    pub failed: Vec<(String, String)>,
    pub output_dir: PathBuf,
}

/// Align the roster against the yearly CSV files of the configured
/// observation directory.
pub fn run_aligner(config: &PipelineConfig, logger: &Logger) -> Result<AlignSummary, Error> {
    let source = Arc::new(CsvYearlyFiles::new(&config.aligner.observation_dir));
    run_aligner_with(config, source, logger)
}

/// Align every configured quantity for the roster stations and write the
/// archive. A quantity whose files cannot be read is reported and skipped;
/// the run fails only if no quantity could be extracted.
pub fn run_aligner_with(
    config: &PipelineConfig,
    source: Arc<dyn ObservationSource>,
    logger: &Logger,
) -> Result<AlignSummary, Error> {
    let aligner = &config.aligner;
    let timeline = build_hourly_timeline(config.year_start, config.year_end)?;
    info!(
        logger,
        "timeline {}-{}: {} hourly slots",
        config.year_start,
        config.year_end,
        timeline.len()
    );

    let mut poc_columns: Vec<&str> = Vec::new();
    let mut text_columns: Vec<&str> = vec![aligner.site_name_column.as_str()];
    for quantity in &aligner.quantities {
        if !poc_columns.contains(&quantity.poc_column.as_str()) {
            poc_columns.push(quantity.poc_column.as_str());
        }
        if let Some(column) = quantity.unit_column.as_deref() {
            if !text_columns.contains(&column) {
                text_columns.push(column);
            }
        }
    }

    info!(logger, "reading roster from {}", aligner.roster_file.display());
    let rows = read_roster_table(&aligner.roster_file, &poc_columns, &text_columns)?;
    if rows.is_empty() {
        return Err(anyhow!(
            "roster {} lists no stations",
            aligner.roster_file.display()
        ));
    }

    let stations: Vec<ArchiveStation> = rows
        .iter()
        .map(|row| ArchiveStation {
            station: row.station.clone(),
            latitude: row.latitude,
            longitude: row.longitude,
            site_name: row.text(&aligner.site_name_column).to_string(),
        })
        .collect();

    let service = SeriesService::new(logger.clone(), source);
    // nothing is written until a group extracts
    let mut writer: Option<ArchiveWriter> = None;
    let mut extracted = Vec::new();
    let mut failed = Vec::new();
    for (prefix, quantities) in group_by_prefix(&aligner.quantities) {
        match service.extract_group(prefix, &quantities, &rows, &timeline) {
            Ok(archives) => {
                let archive_writer = match writer.take() {
                    Some(open) => open,
                    None => start_archive(logger, &aligner.output_dir, &timeline, &stations)?,
                };
                for archive in archives {
                    archive_writer.write_quantity(&archive, rows.len())?;
                    extracted.push(archive.name);
                }
                writer = Some(archive_writer);
            }
            Err(err) => {
                for quantity in quantities {
                    error!(logger, "error extracting {}: {}", quantity.name, err);
                    failed.push((quantity.name.clone(), err.to_string()));
                }
            }
        }
    }

    let Some(writer) = writer else {
        return Err(anyhow!(
            "no quantity could be extracted from {}",
            aligner.observation_dir.display()
        ));
    };
    info!(
        logger,
        "archive written to {} ({} of {} quantities)",
        writer.output_dir().display(),
        extracted.len(),
        aligner.quantities.len()
    );

    Ok(AlignSummary {
        stations: rows.len(),
        timeline_len: timeline.len(),
        extracted,
        failed,
        output_dir: aligner.output_dir.clone(),
    })
}

/// Create the archive directory with its timeline and station files.
fn start_archive(
    logger: &Logger,
    output_dir: &Path,
    timeline: &HourlyTimeline,
    stations: &[ArchiveStation],
) -> Result<ArchiveWriter, Error> {
    let writer = ArchiveWriter::create(logger.clone(), output_dir)?;
    writer.write_timeline(timeline)?;
    writer.write_stations(stations)?;
    Ok(writer)
}

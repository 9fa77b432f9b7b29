use std::collections::HashMap;
use std::fmt;
use time::{Date, Month, PrimitiveDateTime};

use crate::{
    MetadataRecord, ParameterCode, Poc, RosterEntry, StationKey, StationRoster, TimelineError,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("no parameters were requested")]
    NoParameters,
    #[error(
        "no stations report all requested parameters over {interval}, define a different period"
    )]
    EmptyResult { interval: RequestedInterval },
}

/// Period every requested parameter must be covered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedInterval {
    pub start: PrimitiveDateTime,
    pub end: PrimitiveDateTime,
}

impl RequestedInterval {
    pub fn new(start: PrimitiveDateTime, end: PrimitiveDateTime) -> Self {
        RequestedInterval { start, end }
    }

    /// `[year_start-01-01T00:00, (year_end + 1)-01-01T00:00)`: the whole of
    /// every requested year must be covered.
    pub fn for_years(year_start: i32, year_end: i32) -> Result<Self, TimelineError> {
        let invalid = TimelineError::InvalidRange {
            start: year_start,
            end: year_end,
        };
        if year_end < year_start {
            return Err(invalid);
        }
        let start = Date::from_calendar_date(year_start, Month::January, 1)
            .map_err(|_| invalid.clone())?;
        let end = year_end
            .checked_add(1)
            .and_then(|year| Date::from_calendar_date(year, Month::January, 1).ok())
            .ok_or(invalid)?;
        Ok(RequestedInterval::new(start.midnight(), end.midnight()))
    }

    /// True iff `[coverage_start, coverage_end)` encloses this interval.
    /// Unknown bounds never enclose anything.
    pub fn is_enclosed_by(
        &self,
        coverage_start: Option<PrimitiveDateTime>,
        coverage_end: Option<PrimitiveDateTime>,
    ) -> bool {
        match (coverage_start, coverage_end) {
            (Some(start), Some(end)) => start <= self.start && end >= self.end,
            _ => false,
        }
    }
}

impl fmt::Display for RequestedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.start, self.end)
    }
}

/// Metadata records for `parameter_code` whose coverage encloses `interval`,
/// in table order.
pub fn find_qualifying<'a>(
    records: &'a [MetadataRecord],
    parameter_code: ParameterCode,
    interval: &RequestedInterval,
) -> Vec<&'a MetadataRecord> {
    records
        .iter()
        .filter(|record| record.parameter_code == parameter_code)
        .filter(|record| interval.is_enclosed_by(record.coverage_start, record.coverage_end))
        .collect()
}

/// Stations present in every parameter's qualifying set.
///
/// `per_parameter[0]` drives the result: stations keep the order in which they
/// first appear there and take their site details from that record. Membership
/// in the other sets is tested on the station key alone; every qualifying POC
/// found there is kept, in table order.
pub fn intersect_stations(
    per_parameter: &[Vec<&MetadataRecord>],
    interval: &RequestedInterval,
) -> Result<StationRoster, MatchError> {
    let (primary, others) = per_parameter
        .split_first()
        .ok_or(MatchError::NoParameters)?;

    let other_pocs: Vec<HashMap<&StationKey, Vec<Poc>>> =
        others.iter().map(|matches| pocs_by_station(matches)).collect();

    let mut entries: Vec<RosterEntry> = Vec::new();
    let mut position: HashMap<&StationKey, usize> = HashMap::new();

    for record in primary {
        if let Some(&idx) = position.get(&record.station) {
            entries[idx].push_primary_poc(record.poc);
            continue;
        }

        let mut pocs = Vec::with_capacity(per_parameter.len());
        pocs.push(vec![record.poc]);
        for by_station in &other_pocs {
            match by_station.get(&record.station) {
                Some(found) => pocs.push(found.clone()),
                None => break,
            }
        }
        if pocs.len() != per_parameter.len() {
            continue;
        }

        position.insert(&record.station, entries.len());
        entries.push(RosterEntry::new(
            record.station.clone(),
            record.site.clone(),
            pocs,
        ));
    }

    if entries.is_empty() {
        return Err(MatchError::EmptyResult {
            interval: *interval,
        });
    }
    Ok(StationRoster::new(per_parameter.len(), entries))
}

fn pocs_by_station<'a>(matches: &[&'a MetadataRecord]) -> HashMap<&'a StationKey, Vec<Poc>> {
    let mut by_station: HashMap<&StationKey, Vec<Poc>> = HashMap::new();
    for record in matches {
        by_station
            .entry(&record.station)
            .or_default()
            .push(record.poc);
    }
    by_station
}

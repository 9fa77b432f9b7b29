use time::PrimitiveDateTime;

use crate::{HourIndex, HourlyTimeline, ObservationRecord, Poc, StationKey};

/// Value written to the archive for hours without an observation.
pub const MISSING_VALUE_SENTINEL: f64 = -999.9;

/// A single reading of one instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: PrimitiveDateTime,
    pub value: f64,
}

/// Readings of `station`/`poc`, in scan order.
///
/// `parameter_filter` restricts the result to rows with that `Parameter Name`
/// label; wind files carry speed and direction under the same instrument and
/// are only told apart this way.
pub fn extract_series(
    raw: &[ObservationRecord],
    station: &StationKey,
    poc: Poc,
    parameter_filter: Option<&str>,
) -> Vec<SeriesPoint> {
    raw.iter()
        .filter(|record| record.poc == poc && &record.station == station)
        .filter(|record| {
            parameter_filter.map_or(true, |label| record.parameter_name.trim() == label.trim())
        })
        .map(|record| SeriesPoint {
            timestamp: record.timestamp,
            value: record.value,
        })
        .collect()
}

/// One instrument's readings laid onto the dense hourly timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSeries {
    values: Vec<Option<f64>>,
    duplicates_dropped: usize,
    outside_timeline: usize,
}

impl AlignedSeries {
    /// A series with no readings at all, e.g. for an empty roster cell.
    pub fn missing(len: usize) -> Self {
        AlignedSeries {
            values: vec![None; len],
            duplicates_dropped: 0,
            outside_timeline: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn get(&self, slot: usize) -> Option<f64> {
        self.values.get(slot).copied().flatten()
    }

    /// Slots holding a real observation.
    pub fn observed_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn missing_count(&self) -> usize {
        self.values.len() - self.observed_count()
    }

    /// Readings discarded because an earlier one already filled their hour.
    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }

    /// Readings whose hour lies outside the timeline.
    pub fn outside_timeline(&self) -> usize {
        self.outside_timeline
    }

    /// The series with missing hours rendered as [`MISSING_VALUE_SENTINEL`].
    pub fn to_sentinel_values(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|v| v.unwrap_or(MISSING_VALUE_SENTINEL))
            .collect()
    }
}

/// Place each reading in the timeline slot of the same hour.
///
/// Matching is exact on the hour index. When several readings share an hour
/// the first one in scan order is kept and the rest are counted in
/// [`AlignedSeries::duplicates_dropped`].
pub fn align_to_timeline(
    observations: &[SeriesPoint],
    timeline: &HourlyTimeline,
) -> AlignedSeries {
    let mut aligned = AlignedSeries::missing(timeline.len());

    for point in observations {
        let Some(slot) = timeline.slot_of(HourIndex::of(point.timestamp)) else {
            aligned.outside_timeline += 1;
            continue;
        };
        match &mut aligned.values[slot] {
            Some(_) => aligned.duplicates_dropped += 1,
            empty => *empty = Some(point.value),
        }
    }
    aligned
}

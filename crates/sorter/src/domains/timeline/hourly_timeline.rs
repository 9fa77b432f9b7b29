use std::fmt;
use time::{macros::datetime, Date, Duration, Month, PrimitiveDateTime};

/// Reference instant of the linear day numbering; maps to day 1.0.
pub const EPOCH: PrimitiveDateTime = datetime!(0000-01-01 0:00);

const HOURS_PER_DAY: i64 = 24;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    #[error("invalid year range {start}..={end}")]
    InvalidRange { start: i32, end: i32 },
}

/// Whole hours elapsed since [`EPOCH`].
///
/// This is the exact alignment key: two instants share a timeline slot iff
/// their hour indices are equal. Minutes and seconds are truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HourIndex(pub i64);

impl HourIndex {
    pub fn of(instant: PrimitiveDateTime) -> Self {
        HourIndex((instant - EPOCH).whole_hours())
    }

    /// Days since the epoch plus one, e.g. 738157.0 for 2021-01-01T00:00.
    pub fn linear_days(self) -> f64 {
        self.0 as f64 / HOURS_PER_DAY as f64 + 1.0
    }
}

impl fmt::Display for HourIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Convert a naive (GMT) instant into the linear day numbering used by the
/// archive: hours since 0000-01-01T00:00 divided by 24, plus 1.
pub fn timestamp_to_linear_days(instant: PrimitiveDateTime) -> f64 {
    HourIndex::of(instant).linear_days()
}

/// Dense hourly axis from `year_start`-01-01T00:00 through
/// `year_end`-12-31T23:00 inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourlyTimeline {
    year_start: i32,
    year_end: i32,
    start: PrimitiveDateTime,
    first_hour: HourIndex,
    len: usize,
}

impl HourlyTimeline {
    pub fn build(year_start: i32, year_end: i32) -> Result<Self, TimelineError> {
        let invalid = TimelineError::InvalidRange {
            start: year_start,
            end: year_end,
        };
        if year_end < year_start {
            return Err(invalid);
        }
        let first_day =
            Date::from_calendar_date(year_start, Month::January, 1).map_err(|_| invalid.clone())?;
        let last_day =
            Date::from_calendar_date(year_end, Month::December, 31).map_err(|_| invalid.clone())?;

        let days = (last_day - first_day).whole_days() + 1;
        let len = usize::try_from(days * HOURS_PER_DAY).map_err(|_| invalid)?;
        let start = first_day.midnight();

        Ok(HourlyTimeline {
            year_start,
            year_end,
            start,
            first_hour: HourIndex::of(start),
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn years(&self) -> (i32, i32) {
        (self.year_start, self.year_end)
    }

    pub fn first_hour(&self) -> HourIndex {
        self.first_hour
    }

    /// Slot holding `hour`, if it falls inside the timeline.
    pub fn slot_of(&self, hour: HourIndex) -> Option<usize> {
        let offset = hour.0.checked_sub(self.first_hour.0)?;
        usize::try_from(offset).ok().filter(|slot| *slot < self.len)
    }

    pub fn hour_at(&self, slot: usize) -> Option<HourIndex> {
        (slot < self.len).then(|| HourIndex(self.first_hour.0 + slot as i64))
    }

    pub fn hours(&self) -> impl Iterator<Item = HourIndex> + '_ {
        (0..self.len).map(move |slot| HourIndex(self.first_hour.0 + slot as i64))
    }

    pub fn timestamps(&self) -> impl Iterator<Item = PrimitiveDateTime> + '_ {
        (0..self.len).map(move |slot| self.start + Duration::hours(slot as i64))
    }

    /// The timeline in the archive's numeric day encoding.
    pub fn linear_days(&self) -> Vec<f64> {
        self.hours().map(HourIndex::linear_days).collect()
    }
}

pub fn build_hourly_timeline(
    year_start: i32,
    year_end: i32,
) -> Result<HourlyTimeline, TimelineError> {
    HourlyTimeline::build(year_start, year_end)
}

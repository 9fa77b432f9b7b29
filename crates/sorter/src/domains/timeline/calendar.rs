//! Parsing of the calendar fields found in AQS tables.
//!
//! All values are naive GMT wall-clock times; no offsets are applied.

use time::{macros::format_description, Date, Month, PrimitiveDateTime, Time};

/// `First Year of Data` cell (e.g. `"2018"`) as Jan 1 00:00 of that year.
pub fn parse_year_start(raw: &str) -> Option<PrimitiveDateTime> {
    let trimmed = raw.trim();
    let year = trimmed.parse::<i32>().ok().or_else(|| {
        let value = trimmed.parse::<f64>().ok()?;
        (value.fract() == 0.0 && value.abs() < 10_000.0).then_some(value as i32)
    })?;
    Date::from_calendar_date(year, Month::January, 1)
        .ok()
        .map(Date::midnight)
}

/// A `YYYY-MM-DD` date, optionally followed by a time of day separated by a
/// space or `T`.
pub fn parse_calendar_instant(raw: &str) -> Option<PrimitiveDateTime> {
    let trimmed = raw.trim();
    let (date_part, time_part) = match trimmed.find([' ', 'T']) {
        Some(split) => (&trimmed[..split], Some(trimmed[split + 1..].trim())),
        None => (trimmed, None),
    };
    let date = parse_date(date_part)?;
    let time = match time_part {
        Some(time) => parse_time_of_day(time)?,
        None => Time::MIDNIGHT,
    };
    Some(PrimitiveDateTime::new(date, time))
}

/// `Last Sample Date` cell as the exclusive end of coverage. A bare date
/// covers that whole day, so it maps to midnight of the following day.
pub fn parse_last_sample(raw: &str) -> Option<PrimitiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.contains([' ', 'T']) {
        return parse_calendar_instant(trimmed);
    }
    parse_date(trimmed)?.next_day().map(Date::midnight)
}

/// Combine the `Date GMT` and `Time GMT` cells of an observation row.
pub fn parse_gmt_timestamp(date: &str, time: &str) -> Option<PrimitiveDateTime> {
    let date = parse_date(date.trim())?;
    let time = parse_time_of_day(time.trim())?;
    Some(PrimitiveDateTime::new(date, time))
}

fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).ok()
}

fn parse_time_of_day(raw: &str) -> Option<Time> {
    Time::parse(raw, format_description!("[hour]:[minute]"))
        .or_else(|_| Time::parse(raw, format_description!("[hour]:[minute]:[second]")))
        .ok()
}

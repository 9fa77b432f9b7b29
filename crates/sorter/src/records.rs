use std::fmt;
use time::PrimitiveDateTime;

/// Parameter Occurrence Code: disambiguates instruments measuring the same
/// parameter at one station.
pub type Poc = u32;

/// Numeric AQS parameter code, e.g. 61103 for resultant wind speed.
pub type ParameterCode = u32;

/// (state, county, site) triple identifying a monitoring station.
///
/// Codes are stored normalised (see [`normalize_code`]) so `"06"` from one
/// table matches `"6"` from another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationKey {
    pub state_code: String,
    pub county_code: String,
    pub site_number: String,
}

impl StationKey {
    pub fn parse(state_code: &str, county_code: &str, site_number: &str) -> Option<Self> {
        Some(StationKey {
            state_code: normalize_code(state_code)?,
            county_code: normalize_code(county_code)?,
            site_number: normalize_code(site_number)?,
        })
    }
}

impl fmt::Display for StationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.state_code, self.county_code, self.site_number
        )
    }
}

/// Site description carried through to the outputs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SiteInfo {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub state_name: String,
    pub county_name: String,
    pub city_name: String,
}

/// One (station, parameter, instrument) row of the monitor metadata table.
///
/// Coverage bounds are `None` when the source cell could not be parsed; such
/// records never qualify for a requested interval.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    pub station: StationKey,
    pub parameter_code: ParameterCode,
    pub parameter_name: String,
    pub poc: Poc,
    pub coverage_start: Option<PrimitiveDateTime>,
    /// Exclusive: the instant after the last sampled day
    pub coverage_end: Option<PrimitiveDateTime>,
    pub site: SiteInfo,
}

/// One hourly reading from a yearly observation file.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub station: StationKey,
    pub poc: Poc,
    pub parameter_name: String,
    pub timestamp: PrimitiveDateTime,
    pub value: f64,
}

/// Normalise a state/county/site code.
///
/// Numeric codes lose their leading zeros, spreadsheet floats like `"6.0"`
/// become `"6"`, anything else (AQS uses `"CC"` for Canada) is trimmed and
/// upper-cased. Blank and `NaN` cells yield `None`.
pub fn normalize_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if is_blank(trimmed) {
        return None;
    }
    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let stripped = trimmed.trim_start_matches('0');
        return Some(if stripped.is_empty() { "0" } else { stripped }.to_string());
    }
    if let Some(whole) = parse_whole_number(trimmed) {
        return Some(whole.to_string());
    }
    Some(trimmed.to_ascii_uppercase())
}

/// Parse a POC cell; accepts `"1"` and `"1.0"`, rejects blanks and fractions.
pub fn parse_poc(raw: &str) -> Option<Poc> {
    let trimmed = raw.trim();
    if is_blank(trimmed) {
        return None;
    }
    trimmed
        .parse::<Poc>()
        .ok()
        .or_else(|| parse_whole_number(trimmed).and_then(|v| Poc::try_from(v).ok()))
}

pub fn parse_parameter_code(raw: &str) -> Option<ParameterCode> {
    parse_poc(raw)
}

/// Parse an optional floating point cell (coordinates, measurements).
pub fn parse_optional_f64(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if is_blank(trimmed) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn is_blank(trimmed: &str) -> bool {
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan")
}

fn parse_whole_number(trimmed: &str) -> Option<u64> {
    let value = trimmed.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}

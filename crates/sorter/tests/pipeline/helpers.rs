use std::fs;
use std::path::Path;

use mockall::mock;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::RowAccessor;
use slog::{o, Logger};
use sorter::{
    ExtractError, ObservationRecord, ObservationSource, QuantitySpec, Settings, WantedInstruments,
};
use time::{Duration, PrimitiveDateTime};

mock! {
    pub Source {}
    impl ObservationSource for Source {
        fn read_year(
            &self,
            prefix: &str,
            year: i32,
            wanted: &WantedInstruments,
        ) -> Result<Vec<ObservationRecord>, ExtractError>;
    }
}

pub fn test_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

pub const METADATA_HEADER: &str = "State Code,County Code,Site Number,Parameter Code,POC,Latitude,Longitude,Datum,Parameter Name,First Year of Data,Last Sample Date,State Name,County Name,City Name";

/// A metadata row with the columns the matcher reads.
pub fn metadata_row(
    site: &str,
    parameter_code: u32,
    poc: u32,
    first_year: i32,
    last_sample: &str,
    city: &str,
) -> String {
    format!(
        "17,031,{},{},{},41.7514,-87.7135,WGS84,Parameter {},{},{},Illinois,Cook,{}",
        site, parameter_code, poc, parameter_code, first_year, last_sample, city
    )
}

pub fn write_lines(path: &Path, header: &str, rows: &[String]) {
    let mut content = String::from(header);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    fs::write(path, content).unwrap();
}

pub const OBSERVATION_HEADER: &str = "State Code,County Code,Site Num,Parameter Code,POC,Latitude,Longitude,Datum,Parameter Name,Date Local,Time Local,Date GMT,Time GMT,Sample Measurement,Units of Measure";

/// An hourly observation row for Cook County site `site`.
pub fn observation_row(
    site: &str,
    poc: u32,
    parameter_name: &str,
    at: PrimitiveDateTime,
    value: f64,
) -> String {
    let date = format!("{:04}-{:02}-{:02}", at.year(), u8::from(at.month()), at.day());
    let time = format!("{:02}:{:02}", at.hour(), at.minute());
    format!(
        "17,031,{},0,{},41.7514,-87.7135,WGS84,{},{},{},{},{},{},Unit",
        site, poc, parameter_name, date, time, date, time, value
    )
}

/// Every hour in `[start, start + hours)`.
pub fn hours_from(start: PrimitiveDateTime, hours: i64) -> impl Iterator<Item = PrimitiveDateTime> {
    (0..hours).map(move |h| start + Duration::hours(h))
}

/// Settings pointing every input and output into `dir`.
pub fn settings_in(dir: &Path, year_start: i32, year_end: i32) -> Settings {
    let mut settings = Settings {
        year_start: Some(year_start),
        year_end: Some(year_end),
        ..Default::default()
    };
    settings.matcher.metadata_file = dir.join("aqs_monitors.csv");
    settings.matcher.output_file = dir.join("Meta_File.csv");
    settings.aligner.roster_file = dir.join("Meta_File.csv");
    settings.aligner.observation_dir = dir.join("EPA_FILES");
    settings.aligner.output_dir = dir.join("EPA");
    settings
}

pub fn wind_and_temperature() -> Vec<QuantitySpec> {
    vec![
        QuantitySpec::new("WS", "WIND", "POC WS")
            .with_parameter_name("Wind Speed - Resultant")
            .with_unit("Knots"),
        QuantitySpec::new("WD", "WIND", "POC WD")
            .with_parameter_name("Wind Direction - Resultant")
            .with_unit("Degrees Compass"),
        QuantitySpec::new("TEMP", "TEMP", "POC TEMP").with_unit("Degrees Fahrenheit"),
    ]
}

/// `(station_index, time_index, value)` rows of a quantity file.
pub fn read_series(path: &Path) -> Vec<(i64, i64, f64)> {
    let reader = SerializedFileReader::new(fs::File::open(path).unwrap()).unwrap();
    reader
        .get_row_iter(None)
        .unwrap()
        .map(|row| {
            let row = row.unwrap();
            (
                row.get_long(0).unwrap(),
                row.get_long(1).unwrap(),
                row.get_double(2).unwrap(),
            )
        })
        .collect()
}

/// Key/value metadata entry of a parquet file.
pub fn file_metadata(path: &Path, key: &str) -> Option<String> {
    let reader = SerializedFileReader::new(fs::File::open(path).unwrap()).unwrap();
    reader
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .and_then(|kv| kv.iter().find(|entry| entry.key == key).cloned())
        .and_then(|entry| entry.value)
}

pub fn row_count(path: &Path) -> i64 {
    let reader = SerializedFileReader::new(fs::File::open(path).unwrap()).unwrap();
    reader.metadata().file_metadata().num_rows()
}

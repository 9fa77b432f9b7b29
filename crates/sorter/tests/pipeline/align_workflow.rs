use std::path::Path;
use std::sync::Arc;

use sorter::{
    run_aligner, run_aligner_with, run_matcher, ExtractError, ObservationRecord, PipelineConfig,
    QuantitySpec, StationKey, MISSING_VALUE_SENTINEL, STATIONS_FILE, TIMELINE_FILE,
};
use time::macros::datetime;

use crate::helpers::{
    file_metadata, hours_from, metadata_row, observation_row, read_series, row_count,
    settings_in, test_logger, wind_and_temperature, write_lines, MockSource, METADATA_HEADER,
    OBSERVATION_HEADER,
};

const GAP: time::PrimitiveDateTime = datetime!(2021-06-15 12:00);

fn write_chicago_inputs(dir: &Path) {
    let monitors = vec![
        metadata_row("0076", 61103, 1, 1995, "2024-03-31", "Chicago"),
        metadata_row("0076", 61104, 1, 1995, "2024-03-31", "Chicago"),
        metadata_row("0076", 62101, 1, 1995, "2024-03-31", "Chicago"),
        metadata_row("0076", 62101, 2, 2018, "2024-03-31", "Chicago"),
    ];
    write_lines(&dir.join("aqs_monitors.csv"), METADATA_HEADER, &monitors);

    let observations = dir.join("EPA_FILES");
    std::fs::create_dir_all(&observations).unwrap();

    let mut wind = Vec::new();
    for (h, at) in hours_from(datetime!(2021-01-01 0:00), 8760).enumerate() {
        wind.push(observation_row("0076", 1, "Wind Speed - Resultant", at, (h % 20) as f64));
        if h < 48 {
            wind.push(observation_row("0076", 1, "Wind Direction - Resultant", at, 180.0));
        }
    }
    // an instrument nobody asked for
    wind.push(observation_row("0076", 9, "Wind Speed - Resultant", datetime!(2021-01-01 0:00), 99.0));
    write_lines(&observations.join("WIND_2021.csv"), OBSERVATION_HEADER, &wind);

    let mut temperature: Vec<String> = hours_from(datetime!(2021-01-01 0:00), 8760)
        .filter(|at| *at != GAP)
        .map(|at| observation_row("0076", 1, "Outdoor Temperature", at, 50.0))
        .collect();
    temperature.push(observation_row("0076", 2, "Outdoor Temperature", datetime!(2021-03-01 0:00), 40.0));
    temperature.push(observation_row("0076", 2, "Outdoor Temperature", datetime!(2021-03-01 0:00), 41.0));
    write_lines(&observations.join("TEMP_2021.csv"), OBSERVATION_HEADER, &temperature);
}

fn chicago_config(dir: &Path, quantities: Vec<QuantitySpec>) -> PipelineConfig {
    let mut settings = settings_in(dir, 2021, 2021);
    settings.matcher.parameter_codes = vec![61103, 61104, 62101];
    settings.matcher.poc_columns = vec!["POC WS".into(), "POC WD".into(), "POC TEMP".into()];
    settings.aligner.quantities = quantities;
    PipelineConfig::from_settings(&settings).unwrap()
}

#[test]
fn match_then_align_writes_full_archive() {
    let tmp = tempfile::tempdir().unwrap();
    write_chicago_inputs(tmp.path());
    let config = chicago_config(tmp.path(), wind_and_temperature());
    let logger = test_logger();

    let matched = run_matcher(&config, &logger).unwrap();
    assert_eq!((matched.stations, matched.rows), (1, 2));

    let summary = run_aligner(&config, &logger).unwrap();
    assert_eq!(summary.stations, 2);
    assert_eq!(summary.timeline_len, 8760);
    assert_eq!(summary.extracted, vec!["WS", "WD", "TEMP"]);
    assert!(summary.failed.is_empty());

    let archive = &summary.output_dir;
    assert_eq!(row_count(&archive.join(TIMELINE_FILE)), 8760);
    assert_eq!(row_count(&archive.join(STATIONS_FILE)), 2);

    let gap_slot = (GAP - datetime!(2021-01-01 0:00)).whole_hours() as usize;
    let temperature = read_series(&archive.join("TEMP.parquet"));
    assert_eq!(temperature.len(), 2 * 8760);
    let (first_row, second_row) = temperature.split_at(8760);
    let sentinels: Vec<usize> = first_row
        .iter()
        .enumerate()
        .filter(|(_, (_, _, value))| *value == MISSING_VALUE_SENTINEL)
        .map(|(slot, _)| slot)
        .collect();
    assert_eq!(sentinels, vec![gap_slot]);
    assert!(first_row.iter().all(|(station, _, _)| *station == 0));

    // second roster row: instrument 2 only, first of two readings kept
    let march_first = (datetime!(2021-03-01 0:00) - datetime!(2021-01-01 0:00)).whole_hours();
    let observed: Vec<_> = second_row
        .iter()
        .filter(|(_, _, value)| *value != MISSING_VALUE_SENTINEL)
        .collect();
    assert_eq!(observed, vec![&(1, march_first, 40.0)]);

    let speed = read_series(&archive.join("WS.parquet"));
    assert!(speed[..8760]
        .iter()
        .all(|(_, slot, value)| *value == (*slot % 20) as f64));
    assert!(speed[8760..]
        .iter()
        .all(|(_, _, value)| *value == MISSING_VALUE_SENTINEL));

    let direction = read_series(&archive.join("WD.parquet"));
    let observed_direction: Vec<_> = direction[..8760]
        .iter()
        .filter(|(_, _, value)| *value != MISSING_VALUE_SENTINEL)
        .collect();
    assert_eq!(observed_direction.len(), 48);
    assert!(observed_direction.iter().all(|(_, _, value)| *value == 180.0));

    let ws_path = archive.join("WS.parquet");
    assert_eq!(
        file_metadata(&ws_path, "parameter_name").as_deref(),
        Some("Wind Speed - Resultant")
    );
    assert_eq!(file_metadata(&ws_path, "unit").as_deref(), Some("Knots"));
    assert_eq!(
        file_metadata(&archive.join("TEMP.parquet"), "sentinel").as_deref(),
        Some("-999.9")
    );
}

#[test]
fn missing_yearly_file_only_fails_its_quantity() {
    let tmp = tempfile::tempdir().unwrap();
    write_chicago_inputs(tmp.path());
    let mut quantities = wind_and_temperature();
    quantities.push(QuantitySpec::new("PM10", "PM10", "POC TEMP"));
    let config = chicago_config(tmp.path(), quantities);
    let logger = test_logger();

    run_matcher(&config, &logger).unwrap();
    let summary = run_aligner(&config, &logger).unwrap();

    assert_eq!(summary.extracted, vec!["WS", "WD", "TEMP"]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "PM10");
    assert!(summary.failed[0].1.contains("PM10_2021.csv"));
    assert!(!summary.output_dir.join("PM10.parquet").exists());
    assert!(summary.output_dir.join("TEMP.parquet").exists());
}

const ROSTER_HEADER: &str =
    "State Code,County Code,Site Number,POC WS,POC WD,POC TEMP,Latitude,Longitude,City Name,Unit TEMP";

fn write_roster(dir: &Path) {
    write_lines(
        &dir.join("Meta_File.csv"),
        ROSTER_HEADER,
        &[
            "6,37,1103,1,1,1,34.06659,-118.22688,Los Angeles,Degrees Celsius".to_string(),
            "6,37,1103,,,3,,,,".to_string(),
            "6,65,8001,2,2,,33.99958,-117.41601,Rubidoux,Degrees Fahrenheit".to_string(),
        ],
    );
}

fn los_angeles(site: &str) -> StationKey {
    StationKey::parse("06", "037", site).unwrap()
}

fn wind_record(label: &str, year: i32, value: f64) -> ObservationRecord {
    ObservationRecord {
        station: los_angeles("1103"),
        poc: 1,
        parameter_name: label.to_string(),
        timestamp: time::Date::from_calendar_date(year, time::Month::July, 4)
            .unwrap()
            .with_hms(12, 0, 0)
            .unwrap(),
        value,
    }
}

#[test]
fn wind_file_is_read_once_per_year_for_both_components() {
    let tmp = tempfile::tempdir().unwrap();
    write_roster(tmp.path());
    let mut quantities = wind_and_temperature();
    quantities[2] = QuantitySpec::new("TEMP", "TEMP", "POC TEMP").with_unit_column("Unit TEMP");
    let config = chicago_config(tmp.path(), quantities);

    let mut source = MockSource::new();
    source
        .expect_read_year()
        .withf(|prefix, _, wanted| {
            prefix == "WIND"
                && wanted.len() == 2
                && wanted.contains(&los_angeles("1103"), 1)
                && wanted.contains(&StationKey::parse("6", "65", "8001").unwrap(), 2)
        })
        .times(2)
        .returning(|_, year, _| {
            Ok(vec![
                wind_record("Wind Speed - Resultant", year, 4.5),
                wind_record("Wind Direction - Resultant", year, 225.0),
            ])
        });
    source
        .expect_read_year()
        .withf(|prefix, _, _| prefix == "TEMP")
        .times(2)
        .returning(|_, year, _| {
            Ok(vec![ObservationRecord {
                station: los_angeles("1103"),
                poc: 3,
                parameter_name: "Outdoor Temperature".into(),
                timestamp: time::Date::from_calendar_date(year, time::Month::January, 1)
                    .unwrap()
                    .midnight(),
                value: 12.0,
            }])
        });

    let mut two_years = config.clone();
    two_years.year_end = 2022;
    let summary = run_aligner_with(&two_years, Arc::new(source), &test_logger()).unwrap();
    assert_eq!(summary.extracted, vec!["WS", "WD", "TEMP"]);
    assert_eq!(summary.timeline_len, 17520);

    let archive = &summary.output_dir;
    let speed: Vec<_> = read_series(&archive.join("WS.parquet"))
        .into_iter()
        .filter(|(_, _, value)| *value != MISSING_VALUE_SENTINEL)
        .collect();
    assert_eq!(speed.len(), 2);
    assert!(speed.iter().all(|(station, _, value)| *station == 0 && *value == 4.5));

    let temperature: Vec<_> = read_series(&archive.join("TEMP.parquet"))
        .into_iter()
        .filter(|(_, _, value)| *value != MISSING_VALUE_SENTINEL)
        .collect();
    assert_eq!(temperature, vec![(1, 0, 12.0), (1, 8760, 12.0)]);
    // unit comes from the first roster row only
    assert_eq!(
        file_metadata(&archive.join("TEMP.parquet"), "unit").as_deref(),
        Some("Degrees Celsius")
    );
}

#[test]
fn aligner_fails_when_no_quantity_can_be_extracted() {
    let tmp = tempfile::tempdir().unwrap();
    write_roster(tmp.path());
    let config = chicago_config(tmp.path(), wind_and_temperature());

    let mut source = MockSource::new();
    source.expect_read_year().returning(|prefix, year, _| {
        Err(ExtractError::MissingFile {
            prefix: prefix.to_string(),
            year,
            path: format!("{}_{}.csv", prefix, year).into(),
        })
    });

    let err = run_aligner_with(&config, Arc::new(source), &test_logger()).unwrap_err();
    assert!(err.to_string().contains("no quantity could be extracted"));
    assert!(!config.aligner.output_dir.exists());
}

#[test]
fn aligner_requires_configured_roster_columns() {
    let tmp = tempfile::tempdir().unwrap();
    write_roster(tmp.path());
    let mut quantities = wind_and_temperature();
    quantities.push(QuantitySpec::new("PM10", "PM10", "POC PM10"));
    let config = chicago_config(tmp.path(), quantities);

    let source = MockSource::new();
    let err = run_aligner_with(&config, Arc::new(source), &test_logger()).unwrap_err();
    assert!(err.to_string().contains("POC PM10"));
}

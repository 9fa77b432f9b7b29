use std::fs;
use std::path::Path;

use sorter::{run_matcher, MatchError, PipelineConfig, TableError};

use crate::helpers::{metadata_row, settings_in, test_logger, write_lines, METADATA_HEADER};

fn write_monitors(dir: &Path) {
    let rows = vec![
        metadata_row("0076", 61103, 1, 1995, "2024-03-31", "Chicago"),
        metadata_row("0057", 61103, 1, 2001, "2024-03-31", "Cicero"),
        metadata_row("4201", 61103, 1, 1990, "2024-03-31", "Northbrook"),
        metadata_row("1016", 61103, 1, 2010, "2024-03-31", "Lyons"),
        metadata_row("0076", 62101, 1, 1995, "2024-03-31", "Chicago"),
        metadata_row("0076", 62101, 2, 2018, "2024-03-31", "Chicago"),
        metadata_row("0057", 62101, 1, 2001, "2024-03-31", "Cicero"),
        metadata_row("4201", 62101, 1, 1990, "2022-06-30", "Northbrook"),
        metadata_row("1016", 62101, 1, 2010, "2024-03-31", "Lyons"),
        metadata_row("0076", 81102, 3, 1995, "2024-03-31", "Chicago"),
        metadata_row("1016", 81102, 2, 2010, "2024-03-31", "Lyons"),
        // no POC: unusable
        "17,031,0099,81102,,41.0,-87.0,WGS84,PM10,2010,2024-03-31,Illinois,Cook,Nowhere".to_string(),
    ];
    write_lines(&dir.join("aqs_monitors.csv"), METADATA_HEADER, &rows);
}

fn config_for(dir: &Path, year_start: i32, year_end: i32) -> PipelineConfig {
    let mut settings = settings_in(dir, year_start, year_end);
    settings.matcher.parameter_codes = vec![61103, 62101, 81102];
    settings.matcher.poc_columns = vec!["POC WS".into(), "POC TEMP".into(), "POC PM10".into()];
    PipelineConfig::from_settings(&settings).unwrap()
}

#[test]
fn matcher_writes_sparse_roster_for_mutual_stations() {
    let tmp = tempfile::tempdir().unwrap();
    write_monitors(tmp.path());
    let config = config_for(tmp.path(), 2021, 2022);

    let summary = run_matcher(&config, &test_logger()).unwrap();
    assert_eq!(
        summary.candidates,
        vec![(61103, 4), (62101, 4), (81102, 2)]
    );
    assert_eq!(summary.stations, 2);
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.skipped_metadata_rows, 1);

    let content = fs::read_to_string(&summary.output_file).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "State Code,County Code,Site Number,POC WS,POC TEMP,POC PM10,Latitude,Longitude,State Name,County Name,City Name",
            "17,31,76,1,1,3,41.7514,-87.7135,Illinois,Cook,Chicago",
            "17,31,76,,2,,,,,,",
            "17,31,1016,1,1,2,41.7514,-87.7135,Illinois,Cook,Lyons",
        ]
    );
}

#[test]
fn shorter_period_admits_more_stations() {
    let tmp = tempfile::tempdir().unwrap();
    write_monitors(tmp.path());

    let mut settings = settings_in(tmp.path(), 2021, 2021);
    settings.matcher.parameter_codes = vec![61103, 62101];
    settings.matcher.poc_columns = vec!["POC WS".into(), "POC TEMP".into()];
    let config = PipelineConfig::from_settings(&settings).unwrap();

    let summary = run_matcher(&config, &test_logger()).unwrap();
    // Northbrook's temperature coverage ends mid 2022, enough for 2021 alone
    assert_eq!(summary.stations, 4);
}

#[test]
fn matcher_aborts_without_output_when_nothing_qualifies() {
    let tmp = tempfile::tempdir().unwrap();
    write_monitors(tmp.path());
    let config = config_for(tmp.path(), 2021, 2024);

    let err = run_matcher(&config, &test_logger()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MatchError>(),
        Some(MatchError::EmptyResult { .. })
    ));
    assert!(err.to_string().contains("define a different period"));
    assert!(!config.matcher.output_file.exists());
}

#[test]
fn matcher_reports_missing_metadata_columns() {
    let tmp = tempfile::tempdir().unwrap();
    write_lines(
        &tmp.path().join("aqs_monitors.csv"),
        "State Code,County Code,Site Number,Parameter Code,POC",
        &["17,031,0076,61103,1".to_string()],
    );
    let config = config_for(tmp.path(), 2021, 2022);

    let err = run_matcher(&config, &test_logger()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TableError>(),
        Some(TableError::MissingColumn { .. })
    ));
    assert!(!config.matcher.output_file.exists());
}

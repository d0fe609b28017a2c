use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use std::fs;
use std::io::Write;
use synth_control::data::{parse_timestamp, ColumnNames, ConsumptionRecord, RecordLoader, RecordSet};
use synth_control::reshape::{pivot, split_by_treatment, DuplicatePolicy};
use synth_control::SynthError;
use tempfile::NamedTempFile;

fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2013, 1, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn sample_records() -> RecordSet {
    RecordSet::from_records(vec![
        ConsumptionRecord::new("MAC002", at(1, 0, 30), Some(0.2), false).with_acorn("ACORN-A"),
        ConsumptionRecord::new("MAC001", at(1, 0, 0), Some(0.1), true).with_acorn("ACORN-Q"),
        ConsumptionRecord::new("MAC002", at(1, 0, 0), None, false).with_acorn("ACORN-A"),
        ConsumptionRecord::new("MAC003", at(2, 0, 0), Some(0.3), false),
        ConsumptionRecord::new("MAC001", at(2, 0, 0), Some(f64::NAN), true).with_acorn("ACORN-Q"),
    ])
}

fn write_csv(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_pivot_sorts_labels_and_marks_gaps() {
    let matrix = pivot(&sample_records(), DuplicatePolicy::Reject).unwrap();

    assert_eq!(matrix.shape(), (3, 3));
    assert_eq!(matrix.index(), &[at(1, 0, 0), at(1, 0, 30), at(2, 0, 0)][..]);
    let houses: Vec<&str> = matrix.columns().iter().map(String::as_str).collect();
    assert_eq!(houses, vec!["MAC001", "MAC002", "MAC003"]);

    assert_eq!(matrix.get(&at(1, 0, 0), "MAC001"), Some(0.1));
    assert_eq!(matrix.get(&at(1, 0, 30), "MAC002"), Some(0.2));
    // Explicitly missing, NaN and absent readings all end up missing
    assert_eq!(matrix.get(&at(1, 0, 0), "MAC002"), None);
    assert_eq!(matrix.get(&at(2, 0, 0), "MAC001"), None);
    assert_eq!(matrix.get(&at(1, 0, 0), "MAC003"), None);
    assert_eq!(matrix.missing_count(), 6);
}

#[test]
fn test_pivot_does_not_depend_on_record_order() {
    let records = sample_records();
    let reversed: RecordSet = records.records().iter().rev().cloned().collect();

    let forward = pivot(&records, DuplicatePolicy::Reject).unwrap();
    let backward = pivot(&reversed, DuplicatePolicy::Reject).unwrap();

    assert_eq!(forward.index(), backward.index());
    assert_eq!(forward.columns(), backward.columns());
    assert_eq!(forward.missing_per_column(), backward.missing_per_column());
}

#[test]
fn test_split_by_treatment_is_a_partition() {
    let records = sample_records();
    let (treatment, control) = split_by_treatment(&records);

    assert_eq!(treatment.len() + control.len(), records.len());
    assert_eq!(treatment.house_ids(), vec!["MAC001".to_string()]);
    assert_eq!(
        control.house_ids(),
        vec!["MAC002".to_string(), "MAC003".to_string()]
    );
    assert!(treatment.iter().all(|r| r.treated));
    assert!(control.iter().all(|r| !r.treated));
}

#[test]
fn test_record_set_filters() {
    let records = sample_records();

    let acorn_a = records.filter_by_acorn("ACORN-A");
    assert_eq!(acorn_a.len(), 2);
    assert_eq!(acorn_a.house_ids(), vec!["MAC002".to_string()]);
    assert!(records.filter_by_acorn("ACORN-Z").is_empty());

    let first_day = records.within(at(1, 0, 0), at(2, 0, 0)).unwrap();
    assert_eq!(first_day.len(), 3);
    assert!(records.within(at(2, 0, 0), at(1, 0, 0)).is_err());
}

#[test]
fn test_record_value_treats_nan_as_missing() {
    let record = ConsumptionRecord::new("MAC001", at(1, 0, 0), Some(f64::NAN), false);
    assert_eq!(record.value(), None);
    assert_eq!(record.acorn_category, None);
}

#[test]
fn test_validate_house_attributes() {
    assert!(sample_records().validate_house_attributes().is_ok());

    let mut flipped = sample_records();
    flipped.push(ConsumptionRecord::new("MAC003", at(2, 0, 30), Some(0.1), true));
    match flipped.validate_house_attributes() {
        Err(SynthError::InconsistentHouse { house_id, .. }) => assert_eq!(house_id, "MAC003"),
        other => panic!("Expected InconsistentHouse, got {:?}", other),
    }

    let mut relabelled = sample_records();
    relabelled.push(
        ConsumptionRecord::new("MAC002", at(2, 0, 30), Some(0.1), false).with_acorn("ACORN-B"),
    );
    assert!(matches!(
        relabelled.validate_house_attributes(),
        Err(SynthError::InconsistentHouse { .. })
    ));
}

#[test]
fn test_load_csv() {
    let file = write_csv(
        "date_time,house_id,KWH/hh,treated,acorn_category\n\
         2013-01-01 00:00:00,MAC001,0.25,true,ACORN-A\n\
         2013-01-01 00:30:00,MAC001,,true,ACORN-A\n\
         2013-01-01 00:00:00,MAC002,0.5,false,ACORN-E\n",
    );

    let records = RecordLoader::from_csv(file.path(), &ColumnNames::default()).unwrap();

    assert_eq!(records.len(), 3);
    let first = &records.records()[0];
    assert_eq!(first.house_id, "MAC001");
    assert_eq!(first.date_time, at(1, 0, 0));
    assert_eq!(first.consumption, Some(0.25));
    assert!(first.treated);
    assert_eq!(first.acorn_category.as_deref(), Some("ACORN-A"));

    assert_eq!(records.records()[1].consumption, None);
    assert!(!records.records()[2].treated);
}

#[test]
fn test_load_csv_with_custom_columns_and_no_acorn() {
    let file = write_csv(
        "ts,household,energy,group\n\
         2013-01-02 10:00:00,H1,1.5,1\n\
         2013-01-02 10:30:00,H1,1.25,1\n",
    );
    let columns = ColumnNames {
        date_time: "ts".to_string(),
        house_id: "household".to_string(),
        consumption: "energy".to_string(),
        treated: "group".to_string(),
        ..ColumnNames::default()
    };

    let records = RecordLoader::from_csv(file.path(), &columns).unwrap();

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.treated && r.acorn_category.is_none()));
    assert_eq!(records.records()[1].date_time, at(2, 10, 30));
}

#[test]
fn test_load_csv_missing_column() {
    let file = write_csv("date_time,house_id\n2013-01-01 00:00:00,MAC001\n");
    let result = RecordLoader::from_csv(file.path(), &ColumnNames::default());
    assert!(matches!(result, Err(SynthError::DataError(_))));
}

#[test]
fn test_load_csv_missing_file() {
    let result = RecordLoader::from_csv("/nonexistent/readings.csv", &ColumnNames::default());
    assert!(matches!(result, Err(SynthError::IoError(_))));
}

#[test]
fn test_write_csv_round_trips_through_loader_format() {
    let matrix = pivot(&sample_records(), DuplicatePolicy::Reject).unwrap();
    let file = NamedTempFile::new().unwrap();
    matrix.write_csv(file.path()).unwrap();

    let contents = fs::read_to_string(file.path()).unwrap();
    let lines: Vec<&str> = contents.lines().collect();

    assert_eq!(lines[0], "date_time,MAC001,MAC002,MAC003");
    assert_eq!(lines[1], "2013-01-01 00:00:00,0.1,,");
    assert_eq!(lines.len(), 4);
    assert_eq!(parse_timestamp(lines[3].split(',').next().unwrap()).unwrap(), at(2, 0, 0));
}

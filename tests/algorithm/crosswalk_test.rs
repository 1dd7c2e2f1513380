//! Tests for building the occupation crosswalk

use std::fs;

use cps_exposure::algorithm::CrosswalkBuilder;
use cps_exposure::config::{CrosswalkConfig, DuplicatePolicy, MultiCodePolicy};
use cps_exposure::error::PipelineError;
use cps_exposure::reader::DirectorySheetSource;
use cps_exposure::utils::test::{MemorySheetSource, table_from_rows, write_csv_rows};

fn mapping(crosswalk: &cps_exposure::algorithm::Crosswalk) -> Vec<(String, String)> {
    crosswalk
        .entries
        .iter()
        .map(|e| {
            (
                e.occupation_code.to_string(),
                e.classification_code.to_string(),
            )
        })
        .collect()
}

fn pair(occ: &str, soc: &str) -> (String, String) {
    (occ.to_string(), soc.to_string())
}

#[test]
fn test_duplicates_keep_lowest_code() {
    let table = table_from_rows(
        &["census_code", "soc_code"],
        &[
            &["10", "11-2021"],
            &["10", "11-1011"],
            &["0010", "11-1011"],
            &["20", "13-1011"],
        ],
    );
    let config = CrosswalkConfig::default();
    let crosswalk = CrosswalkBuilder::new(&config)
        .build_from_table(&table, "test")
        .unwrap();

    assert_eq!(
        mapping(&crosswalk),
        vec![pair("0010", "11-1011"), pair("0020", "13-1011")]
    );
    assert_eq!(crosswalk.stats.ambiguous_codes, 1);
    assert_eq!(crosswalk.stats.final_rows, 2);
}

#[test]
fn test_occupation_codes_are_unique() {
    let table = table_from_rows(
        &["occ", "soc"],
        &[
            &["10", "11-1011"],
            &["10", "11-1021"],
            &["10", "11-1031"],
            &["430", "11-9199"],
            &["430", "11-9199"],
        ],
    );
    let config = CrosswalkConfig::default();
    let crosswalk = CrosswalkBuilder::new(&config)
        .build_from_table(&table, "test")
        .unwrap();
    let lookup = crosswalk.lookup();
    assert_eq!(lookup.len(), crosswalk.len());
    assert_eq!(crosswalk.len(), 2);
}

#[test]
fn test_duplicate_policies() {
    let table = table_from_rows(
        &["occ", "soc"],
        &[
            &["30", "11-0000"],
            &["30", "11-3021"],
            &["40", "13-2011"],
        ],
    );

    let detailed = CrosswalkConfig {
        duplicate_policy: DuplicatePolicy::PreferDetailed,
        ..CrosswalkConfig::default()
    };
    let crosswalk = CrosswalkBuilder::new(&detailed)
        .build_from_table(&table, "test")
        .unwrap();
    assert_eq!(
        mapping(&crosswalk),
        vec![pair("0030", "11-3021"), pair("0040", "13-2011")]
    );

    let strict = CrosswalkConfig {
        duplicate_policy: DuplicatePolicy::DropAmbiguous,
        ..CrosswalkConfig::default()
    };
    let crosswalk = CrosswalkBuilder::new(&strict)
        .build_from_table(&table, "test")
        .unwrap();
    assert_eq!(mapping(&crosswalk), vec![pair("0040", "13-2011")]);
    assert_eq!(crosswalk.stats.dropped_ambiguous, 1);
}

#[test]
fn test_multi_code_cells() {
    let table = table_from_rows(
        &["occ", "soc"],
        &[&["10", "11-2021/11-1011"], &["20", "13-1011"]],
    );

    let first = CrosswalkConfig::default();
    let crosswalk = CrosswalkBuilder::new(&first)
        .build_from_table(&table, "test")
        .unwrap();
    assert_eq!(
        mapping(&crosswalk),
        vec![pair("0010", "11-2021"), pair("0020", "13-1011")]
    );
    assert_eq!(crosswalk.stats.multi_code_cells, 1);

    let strict = CrosswalkConfig {
        multi_code_policy: MultiCodePolicy::Strict,
        ..CrosswalkConfig::default()
    };
    let crosswalk = CrosswalkBuilder::new(&strict)
        .build_from_table(&table, "test")
        .unwrap();
    assert_eq!(mapping(&crosswalk), vec![pair("0020", "13-1011")]);
    assert_eq!(crosswalk.stats.invalid_rows, 1);

    // Expanded tokens still go through the duplicate policy
    let expand = CrosswalkConfig {
        multi_code_policy: MultiCodePolicy::Expand,
        ..CrosswalkConfig::default()
    };
    let crosswalk = CrosswalkBuilder::new(&expand)
        .build_from_table(&table, "test")
        .unwrap();
    assert_eq!(
        mapping(&crosswalk),
        vec![pair("0010", "11-1011"), pair("0020", "13-1011")]
    );
}

#[test]
fn test_columns_found_by_content_when_headers_are_unknown() {
    let table = table_from_rows(
        &["Description", "A", "B"],
        &[
            &["Chief executives", "11-1011", "10"],
            &["Legislators", "11-1031", "30"],
            &["Total, all occupations", "", ""],
        ],
    );
    let config = CrosswalkConfig::default();
    let crosswalk = CrosswalkBuilder::new(&config)
        .build_from_table(&table, "test")
        .unwrap();
    assert_eq!(crosswalk.stats.occupation_column, "B");
    assert_eq!(crosswalk.stats.classification_column, "A");
    assert_eq!(crosswalk.stats.invalid_rows, 1);
    assert_eq!(crosswalk.len(), 2);
}

#[test]
fn test_workbook_falls_through_to_usable_sheet() {
    let workbook = MemorySheetSource::new("census_occ_codes")
        .with_sheet("2018 Census Occ Code", &[&["Notes"], &["See the code list sheet"]])
        .with_sheet(
            "Census Occ Code List",
            &[
                &["2018 Census Occupation Code List", "", ""],
                &["Occupation title", "2018 Census code", "2018 SOC code"],
                &["Chief executives", "0010", "11-1011"],
                &["General and operations managers", "0020", "11-1021"],
                &["", "", ""],
                &["Legislators", "0030", "11-1031"],
            ],
        );

    let config = CrosswalkConfig {
        min_expected_rows: 0,
        ..CrosswalkConfig::default()
    };
    let crosswalk = CrosswalkBuilder::new(&config)
        .build_from_workbook(&workbook)
        .unwrap();

    assert_eq!(crosswalk.stats.source, "Census Occ Code List");
    assert!(crosswalk.stats.header_row.is_some());
    assert_eq!(
        mapping(&crosswalk),
        vec![
            pair("0010", "11-1011"),
            pair("0020", "11-1021"),
            pair("0030", "11-1031"),
        ]
    );
}

#[test]
fn test_workbook_without_usable_sheet_fails() {
    let workbook = MemorySheetSource::new("broken")
        .with_sheet("Sheet1", &[&["Title only"], &["nothing", "here"]]);
    let config = CrosswalkConfig::default();
    let err = CrosswalkBuilder::new(&config)
        .build_from_workbook(&workbook)
        .unwrap_err();

    assert!(matches!(err, PipelineError::WorkbookUnusable { .. }));
    assert_eq!(err.exit_code(), 3);
    // Every candidate sheet is named in the failure
    let message = err.to_string();
    assert!(message.contains("2018 Census Occ Code List"), "{message}");
    assert!(message.contains("Sheet1"), "{message}");
}

#[test]
fn test_forced_sheet_from_directory_export() {
    let dir = tempfile::tempdir().unwrap();
    write_csv_rows(
        &dir.path().join("codes.csv"),
        &["Occupation", "Code", "SOC"],
        &[
            &["Chief executives", "10", "11-1011"],
            &["Legislators", "30", "11-1031"],
        ],
    )
    .unwrap();

    let config = CrosswalkConfig {
        sheet: Some("codes".to_string()),
        min_expected_rows: 0,
        ..CrosswalkConfig::default()
    };
    let source = DirectorySheetSource::open(dir.path()).unwrap();
    let crosswalk = CrosswalkBuilder::new(&config)
        .build_from_workbook(&source)
        .unwrap();
    assert_eq!(crosswalk.stats.source, "codes");
    assert_eq!(crosswalk.stats.header_row, Some(0));
    assert_eq!(crosswalk.len(), 2);
}

#[test]
fn test_directory_sheet_with_bare_title_row() {
    let dir = tempfile::tempdir().unwrap();
    // Spreadsheet exports leave the title row without trailing delimiters
    fs::write(
        dir.path().join("2018 Census Occ Code List.csv"),
        "2018 Census Occupation Code List\n\
         Occupation title,2018 Census code,2018 SOC code\n\
         Chief executives,0010,11-1011\n\
         General and operations managers,0020,11-1021\n\
         Legislators,0030,11-1031\n",
    )
    .unwrap();

    let config = CrosswalkConfig {
        min_expected_rows: 0,
        ..CrosswalkConfig::default()
    };
    let source = DirectorySheetSource::open(dir.path()).unwrap();
    let crosswalk = CrosswalkBuilder::new(&config)
        .build_from_workbook(&source)
        .unwrap();

    assert_eq!(crosswalk.stats.source, "2018 Census Occ Code List");
    assert!(crosswalk.stats.header_row.is_some());
    assert_eq!(
        mapping(&crosswalk),
        vec![
            pair("0010", "11-1011"),
            pair("0020", "11-1021"),
            pair("0030", "11-1031"),
        ]
    );
}

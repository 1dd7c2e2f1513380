//! End-to-end runs over the small reference scenario

use cps_exposure::config::{ContextTable, CrosswalkSource};
use cps_exposure::models::PanelRecord;
use cps_exposure::pipeline::{Pipeline, run_crosswalk};
use cps_exposure::reader::{read_delimited, read_parquet_records};
use cps_exposure::utils::test::{
    scenario_config, timed_execution, write_csv_rows, write_scenario_inputs,
};

use crate::utils::{assert_close, print_timing, read_text};

#[test]
fn test_full_run_reports_match_quality() {
    let dir = tempfile::tempdir().unwrap();
    write_scenario_inputs(dir.path()).unwrap();
    let config = scenario_config(dir.path());

    let (elapsed, manifest) = timed_execution(|| Pipeline::new(&config, false).run());
    let manifest = manifest.unwrap();
    print_timing("Scenario run", elapsed);

    assert_eq!(manifest.ingest.rows, 4);
    assert_eq!(manifest.ingest.occupation_column, "OCC");
    assert_eq!(manifest.ingest.missing_occupation, 1);
    assert_eq!(manifest.crosswalk.final_rows, 2);

    let report = &manifest.crosswalk_join.report;
    assert_eq!(report.total_rows, 4);
    assert_eq!(report.matched_rows, 2);
    assert_eq!(report.unmatched_rows, 2);
    assert_eq!(report.missing_key_rows, 1);
    assert_close(report.matched_weight, 30.0);
    assert_close(report.unmatched_weight, 6.0);
    assert_close(report.total_weight, 36.0);
    assert_close(manifest.crosswalk_join.matched_weight_share, 100.0 * 30.0 / 36.0);

    // Persons without a classification code carry no key into the exposure join
    let exposure = &manifest.exposure_join.report;
    assert_eq!(exposure.total_rows, 4);
    assert_eq!(exposure.matched_rows, 2);
    assert_eq!(exposure.missing_key_rows, 2);

    assert_eq!(manifest.exposure.codes, 1);
    assert_close(manifest.quantiles.p50.unwrap(), 0.58);
    assert!(manifest.context.is_empty());
}

#[test]
fn test_full_run_writes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    write_scenario_inputs(dir.path()).unwrap();
    let config = scenario_config(dir.path());
    let manifest = Pipeline::new(&config, false).run().unwrap();

    let out = &config.output_dir;
    for file in [
        "persons.parquet",
        "persons.csv",
        "crosswalk.parquet",
        "crosswalk.csv",
        "classified.parquet",
        "classified.csv",
        "panel.parquet",
        "panel.csv",
        "exposure.csv",
        "unmatched_top.csv",
        "snapshot_unweighted.csv",
        "snapshot_weighted.csv",
        "manifest.json",
    ] {
        let path = out.join(file);
        assert!(path.is_file(), "missing {}", path.display());
        assert!(manifest.outputs.contains(&path), "{file} not listed in manifest");
    }
    assert!(!out.join("panel_context.csv").exists());

    // The unmatched report lists only keyed rows
    assert_eq!(
        read_text(&out.join("unmatched_top.csv")),
        "occupation_code,rows,weight\n9999,1,5.000000\n"
    );

    // Every person survives both joins
    let panel: Vec<PanelRecord> = read_parquet_records(&out.join("panel.parquet")).unwrap();
    assert_eq!(panel.len(), 4);
    let exposures: Vec<Option<f64>> = panel.iter().map(|p| p.exposure).collect();
    assert_close(exposures[0].unwrap(), 0.58);
    assert_close(exposures[1].unwrap(), 0.58);
    assert!(exposures[2].is_none());
    assert!(exposures[3].is_none());
    assert_eq!(panel[0].occupation_code.as_ref().unwrap().as_str(), "0001");

    let snapshot = read_delimited(&out.join("snapshot_weighted.csv")).unwrap();
    assert_eq!(snapshot.num_rows(), 1);
    assert_eq!(snapshot.cell("weighted_percentile", 0), Some("100"));

    let manifest_json: serde_json::Value =
        serde_json::from_str(&read_text(&out.join("manifest.json"))).unwrap();
    assert_eq!(manifest_json["crosswalk_join"]["matched_rows"], 2);
    assert_eq!(manifest_json["ingest"]["rows"], 4);
    assert!(manifest_json["started_at"].is_string());
}

#[test]
fn test_context_tables_join_or_skip() {
    let dir = tempfile::tempdir().unwrap();
    write_scenario_inputs(dir.path()).unwrap();
    let flows = write_csv_rows(
        &dir.path().join("flows.csv"),
        &["STATEFIP", "quits"],
        &[&["6", "2.1"], &["36", "1.8"]],
    )
    .unwrap();
    let misc = write_csv_rows(
        &dir.path().join("misc.csv"),
        &["series_id", "value"],
        &[&["A1", "3"]],
    )
    .unwrap();

    let mut config = scenario_config(dir.path());
    config.inputs.context = vec![
        ContextTable {
            name: "flows".to_string(),
            path: flows,
        },
        ContextTable {
            name: "misc".to_string(),
            path: misc,
        },
        ContextTable {
            name: "absent".to_string(),
            path: dir.path().join("absent.csv"),
        },
    ];

    let manifest = Pipeline::new(&config, false).run().unwrap();
    assert_eq!(manifest.context.len(), 3);

    let flows_summary = &manifest.context[0];
    assert!(flows_summary.plan.compatible, "{}", flows_summary.plan.reason);
    let report = flows_summary.report.as_ref().unwrap();
    assert_eq!(report.total_rows, 4);
    assert_eq!(report.matched_rows, 3);

    assert!(!manifest.context[1].plan.compatible);
    assert!(manifest.context[1].report.is_none());
    assert!(!manifest.context[2].plan.compatible);

    let extended = read_delimited(&config.output_dir.join("panel_context.csv")).unwrap();
    assert_eq!(extended.num_rows(), 4);
    assert_eq!(extended.cell("flows_quits", 0), Some("2.1"));
    assert_eq!(extended.cell("flows_quits", 1), Some("1.8"));
    assert_eq!(extended.cell("flows_quits", 3), None);
}

#[test]
fn test_workbook_crosswalk_run() {
    let dir = tempfile::tempdir().unwrap();
    let workbook = dir.path().join("census_occ_codes");
    write_csv_rows(
        &workbook.join("2018 Census Occ Code List.csv"),
        &["2018 Census Occupation Code List", "", ""],
        &[
            &["Occupation title", "2018 Census code", "2018 SOC code"],
            &["Chief executives", "0010", "11-1011"],
            &["Chief executives", "10", "11-1011"],
            &["Legislators", "0030", "11-1031"],
        ],
    )
    .unwrap();

    let mut config = scenario_config(dir.path());
    config.inputs.crosswalk = CrosswalkSource::Workbook { dir: workbook };

    let crosswalk = run_crosswalk(&config).unwrap();
    assert_eq!(crosswalk.len(), 2);
    assert_eq!(crosswalk.stats.source, "2018 Census Occ Code List");
    assert!(config.output_dir.join("crosswalk.parquet").is_file());
    assert!(config.output_dir.join("crosswalk.csv").is_file());
}

#[test]
fn test_missing_tasks_file_aborts() {
    let dir = tempfile::tempdir().unwrap();
    write_scenario_inputs(dir.path()).unwrap();
    let mut config = scenario_config(dir.path());
    config.inputs.tasks = dir.path().join("missing_tasks.csv");

    let err = Pipeline::new(&config, false).run().unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(!config.output_dir.join("manifest.json").exists());
    assert!(!config.output_dir.join("persons.parquet").exists());
    assert!(!config.output_dir.join("persons.csv").exists());
}

#[test]
fn test_missing_workbook_aborts_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    write_scenario_inputs(dir.path()).unwrap();
    let mut config = scenario_config(dir.path());
    config.inputs.crosswalk = CrosswalkSource::Workbook {
        dir: dir.path().join("no_workbook"),
    };

    let err = Pipeline::new(&config, false).run().unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(!config.output_dir.exists());
}

//! Tests for exposure scoring and percentile snapshots

use cps_exposure::algorithm::{
    ExposureQuantiles, aggregate_exposure, tasks_from_table, unweighted_snapshot,
    weighted_quantile, weighted_snapshot,
};
use cps_exposure::codes::ClassificationCode;
use cps_exposure::models::TaskScore;
use cps_exposure::schema::ClassifierOptions;
use cps_exposure::utils::test::table_from_rows;

use crate::utils::{assert_close, panel_row};

fn task(code: &str, importance: f64, time_weight: f64) -> TaskScore {
    TaskScore {
        classification_code: ClassificationCode::parse(code).unwrap(),
        importance,
        time_weight,
    }
}

#[test]
fn test_single_unit_task_scores_one() {
    let (scores, divisors) = aggregate_exposure(&[task("15-1252", 1.0, 1.0)]);
    assert_eq!(divisors.importance, 1.0);
    assert_eq!(divisors.time, 1.0);
    assert_eq!(scores.len(), 1);
    assert_close(scores[0].exposure.unwrap(), 1.0);
    assert_eq!(scores[0].task_count, 1);
}

#[test]
fn test_percent_scales_are_normalized() {
    let (scores, divisors) =
        aggregate_exposure(&[task("11-1011", 50.0, 80.0), task("11-1011", 90.0, 20.0)]);
    assert_eq!(divisors.importance, 100.0);
    assert_eq!(divisors.time, 100.0);
    assert_close(scores[0].exposure.unwrap(), 0.58);
    assert_close(scores[0].total_time, 1.0);
}

#[test]
fn test_zero_time_gives_missing_exposure() {
    let (scores, _) = aggregate_exposure(&[task("11-1011", 0.5, 0.0), task("13-2011", 0.4, 0.5)]);
    assert_eq!(scores.len(), 2);
    assert!(scores[0].exposure.is_none());
    assert_close(scores[1].exposure.unwrap(), 0.4);
}

#[test]
fn test_task_table_parsing() {
    let table = table_from_rows(
        &["O*NET-SOC Code", "Task", "importance", "time"],
        &[
            &["11-1011.00", "Direct activities", "0.8", "0.5"],
            &["11-1011.03", "Set policy", "0.6", "0.5"],
            &["bogus", "Nothing", "0.9", "0.1"],
            &["13-2011.00", "Audit", "", "0.4"],
        ],
    );
    let (tasks, stats) = tasks_from_table(&table, &ClassifierOptions::default()).unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(stats.invalid_code, 1);
    assert_eq!(stats.invalid_value, 1);

    // Detailed O*NET suffixes collapse onto the classification code
    let (scores, _) = aggregate_exposure(&tasks);
    assert_eq!(scores.len(), 1);
    assert_close(scores[0].exposure.unwrap(), 0.7);
}

#[test]
fn test_task_table_without_usable_rows_is_empty_result() {
    let table = table_from_rows(&["soc", "importance", "time"], &[&["11-1011", "x", "y"]]);
    let err = tasks_from_table(&table, &ClassifierOptions::default()).unwrap_err();
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn test_weighted_percentiles_monotonic_for_equal_weights() {
    let panel = vec![
        panel_row("11-1011", Some(0.4), 1.0),
        panel_row("13-2011", Some(0.1), 1.0),
        panel_row("15-1252", Some(0.3), 1.0),
        panel_row("29-1141", Some(0.2), 1.0),
    ];
    let rows = weighted_snapshot(&panel);
    assert_eq!(rows.len(), 4);

    let percentiles: Vec<u32> = rows.iter().map(|r| r.weighted_percentile).collect();
    assert_eq!(percentiles, vec![25, 50, 75, 100]);
    assert!(rows.windows(2).all(|w| w[0].exposure < w[1].exposure));
}

#[test]
fn test_weighted_percentiles_follow_weight_mass() {
    let panel = vec![
        panel_row("11-1011", Some(0.2), 90.0),
        panel_row("13-2011", Some(0.8), 10.0),
        panel_row("13-2011", Some(0.8), 0.0),
        panel_row("15-1252", None, 500.0),
    ];
    let rows = weighted_snapshot(&panel);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].weighted_percentile, 90);
    assert_eq!(rows[1].weighted_percentile, 100);
    assert_eq!(rows[1].respondents, 2);
}

#[test]
fn test_unweighted_percentiles_share_ties() {
    let (scores, _) = aggregate_exposure(&[
        task("11-1011", 0.5, 1.0),
        task("13-2011", 0.5, 1.0),
        task("15-1252", 0.9, 1.0),
        task("29-1141", 0.7, 0.0),
    ]);
    let panel = vec![
        panel_row("11-1011", Some(0.5), 2.0),
        panel_row("11-1011", Some(0.5), 3.0),
    ];
    let rows = unweighted_snapshot(&scores, &panel);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].percentile, Some(67));
    assert_eq!(rows[1].percentile, Some(67));
    assert_eq!(rows[2].percentile, Some(100));
    // Codes without a score come last
    assert_eq!(rows[3].classification_code.as_str(), "29-1141");
    assert_eq!(rows[3].percentile, None);

    assert_eq!(rows[0].classification_code.as_str(), "11-1011");
    assert_eq!(rows[0].respondents, 2);
    assert_close(rows[0].weight, 5.0);
}

#[test]
fn test_weighted_quantiles() {
    let values = [(0.1, 1.0), (0.2, 1.0), (0.3, 1.0), (0.4, 1.0)];
    assert_eq!(weighted_quantile(&values, 0.5), Some(0.2));
    assert_eq!(weighted_quantile(&values, 0.9), Some(0.4));
    assert_eq!(weighted_quantile(&[], 0.5), None);
    assert_eq!(weighted_quantile(&[(0.3, 0.0)], 0.5), None);

    let panel = vec![panel_row("11-1011", Some(0.58), 30.0), panel_row("11-1011", None, 6.0)];
    let quantiles = ExposureQuantiles::from_panel(&panel);
    assert_eq!(quantiles.p10, Some(0.58));
    assert_eq!(quantiles.p90, Some(0.58));
}

//! Tests for the weighted left join

use rand::Rng;
use rustc_hash::FxHashMap;

use cps_exposure::algorithm::{weighted_left_join, write_unmatched_csv};
use cps_exposure::models::Weighted;

#[derive(Debug, Clone)]
struct Respondent {
    key: Option<u32>,
    weight: f64,
}

impl Weighted for Respondent {
    fn weight(&self) -> f64 {
        self.weight
    }
}

fn respondents(keys_and_weights: &[(Option<u32>, f64)]) -> Vec<Respondent> {
    keys_and_weights
        .iter()
        .map(|&(key, weight)| Respondent { key, weight })
        .collect()
}

#[test]
fn test_join_never_drops_rows() {
    let mut rng = rand::rng();
    for _ in 0..25 {
        let left: Vec<Respondent> = (0..rng.random_range(0..200))
            .map(|_| Respondent {
                key: rng.random_bool(0.9).then(|| rng.random_range(0..50)),
                weight: rng.random_range(0.0..1000.0),
            })
            .collect();
        let lookup: FxHashMap<u32, String> = (0..rng.random_range(0..50))
            .map(|k| (k * 2, format!("value-{k}")))
            .collect();

        let expected = left.len();
        let outcome = weighted_left_join(left, &lookup, |r| r.key.as_ref(), |r, v| (r, v.cloned()));

        assert_eq!(outcome.rows.len(), expected);
        assert_eq!(outcome.matched.len(), expected);
        let report = &outcome.report;
        assert_eq!(report.total_rows, expected);
        assert_eq!(report.matched_rows + report.unmatched_rows, expected);
        assert!(report.missing_key_rows <= report.unmatched_rows);

        let share = report.matched_weight_share();
        assert!((0.0..=100.0).contains(&share), "share {share} out of range");

        // Match flags agree with the combined rows
        for ((row, value), matched) in outcome.rows.iter().zip(&outcome.matched) {
            assert_eq!(value.is_some(), *matched);
            assert_eq!(*matched, row.key.is_some_and(|k| lookup.contains_key(&k)));
        }
    }
}

#[test]
fn test_fully_matched_share_is_100() {
    let lookup: FxHashMap<u32, ()> = [(1, ()), (2, ())].into_iter().collect();

    let left = respondents(&[(Some(1), 3.0), (Some(2), 7.0)]);
    let outcome = weighted_left_join(left, &lookup, |r| r.key.as_ref(), |r, _| r);
    assert_eq!(outcome.report.matched_weight_share(), 100.0);

    // Zero total weight still reports a full match
    let left = respondents(&[(Some(1), 0.0), (Some(2), 0.0)]);
    let outcome = weighted_left_join(left, &lookup, |r| r.key.as_ref(), |r, _| r);
    assert_eq!(outcome.report.matched_weight_share(), 100.0);
}

#[test]
fn test_share_is_weighted_not_counted() {
    let lookup: FxHashMap<u32, ()> = [(1, ())].into_iter().collect();
    // One heavy matched row, three light unmatched rows
    let left = respondents(&[(Some(1), 97.0), (Some(5), 1.0), (Some(6), 1.0), (None, 1.0)]);
    let outcome = weighted_left_join(left, &lookup, |r| r.key.as_ref(), |r, _| r);

    let report = &outcome.report;
    assert_eq!(report.matched_rows, 1);
    assert_eq!(report.unmatched_rows, 3);
    assert_eq!(report.missing_key_rows, 1);
    assert!((report.matched_weight_share() - 97.0).abs() < 1e-9);
    assert!((report.matched_row_share() - 25.0).abs() < 1e-9);
}

#[test]
fn test_top_unmatched_report() {
    let lookup: FxHashMap<u32, ()> = FxHashMap::default();
    let left = respondents(&[
        (Some(7), 2.0),
        (Some(3), 5.0),
        (Some(7), 4.0),
        (Some(9), 1.0),
        (None, 50.0),
    ]);
    let outcome = weighted_left_join(left, &lookup, |r| r.key.as_ref(), |r, _| r);

    let top = outcome.top_unmatched(2);
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].key, 7);
    assert_eq!(top[0].rows, 2);
    assert!((top[0].weight - 6.0).abs() < 1e-9);
    assert_eq!(top[1].key, 3);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports").join("unmatched.csv");
    write_unmatched_csv(&path, "key", &outcome.top_unmatched(10)).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        text,
        "key,rows,weight\n7,2,6.000000\n3,1,5.000000\n9,1,1.000000\n"
    );
}

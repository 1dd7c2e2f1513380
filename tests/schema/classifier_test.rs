//! Tests for content-based column classification

use rand::seq::SliceRandom;

use cps_exposure::algorithm::persons_from_table;
use cps_exposure::codes::CodeShape;
use cps_exposure::schema::{ClassifierOptions, classify, classify_excluding, classify_pair};
use cps_exposure::table::Column;
use cps_exposure::utils::test::table_from_rows;

fn column(name: &str, cells: &[&str]) -> Column {
    Column::new(name, cells.iter().map(|c| Some(*c)))
}

fn as_inputs(columns: &[Column]) -> impl Iterator<Item = (&str, &[Option<String>])> + Clone {
    columns.iter().map(|c| (c.name.as_str(), c.cells.as_slice()))
}

#[test]
fn test_picks_fully_matching_column_regardless_of_order() {
    let mut columns = vec![
        column("title", &["Chief executives", "Legislators", "Managers"]),
        column("weight", &["1234.5", "88.25", "9.75"]),
        column("soc", &["11-1011", "11-1031", "11-9199"]),
        column("notes", &["", "see above", "n/a"]),
    ];

    let mut rng = rand::rng();
    for _ in 0..50 {
        columns.shuffle(&mut rng);
        let found = classify(as_inputs(&columns), &CodeShape::Classification).unwrap();
        assert_eq!(found.name, "soc");
        assert_eq!(columns[found.index].name, "soc");
        assert!((found.score - 1.0).abs() < f64::EPSILON);
    }
}

#[test]
fn test_header_names_are_ignored() {
    // The column named like a code column holds labels
    let columns = vec![
        column("occupation_code", &["Chief executives", "Legislators"]),
        column("x2", &["0010", "0030"]),
    ];
    let found = classify(as_inputs(&columns), &CodeShape::Occupation).unwrap();
    assert_eq!(found.name, "x2");
}

#[test]
fn test_no_matching_column_is_an_error() {
    let columns = vec![column("a", &["x", "y"]), column("b", &["", "z"])];
    let err = classify(as_inputs(&columns), &CodeShape::Occupation).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("a, b"), "{message}");
}

#[test]
fn test_min_score_is_strict() {
    let columns = vec![column("half", &["0010", "oops"])];
    let options = ClassifierOptions {
        min_score: 0.5,
        max_sample: None,
    };
    assert!(classify_excluding(as_inputs(&columns), &CodeShape::Occupation, &options, None).is_err());

    let lenient = ClassifierOptions {
        min_score: 0.49,
        max_sample: None,
    };
    assert!(classify_excluding(as_inputs(&columns), &CodeShape::Occupation, &lenient, None).is_ok());
}

#[test]
fn test_max_sample_limits_scored_cells() {
    let columns = vec![
        column("late", &["x", "x", "0010", "0020"]),
        column("early", &["0010", "0020", "x", "x"]),
    ];
    let options = ClassifierOptions {
        min_score: 0.0,
        max_sample: Some(2),
    };
    let found =
        classify_excluding(as_inputs(&columns), &CodeShape::Occupation, &options, None).unwrap();
    assert_eq!(found.name, "early");
}

#[test]
fn test_pair_lands_on_distinct_columns() {
    let columns = vec![
        column("census", &["0010", "0020", "0030"]),
        column("soc", &["111011", "111021", "111031"]),
    ];
    let (occ, soc) = classify_pair(
        as_inputs(&columns),
        &CodeShape::Occupation,
        &CodeShape::Classification,
        &ClassifierOptions::default(),
    )
    .unwrap();
    assert_eq!(occ.name, "census");
    assert_eq!(soc.name, "soc");
    assert_ne!(occ.index, soc.index);
}

#[test]
fn test_person_occupation_found_by_content() {
    let table = table_from_rows(
        &["job_title", "q17", "ASECWT"],
        &[
            &["Chief executives", "10", "100.5"],
            &["Legislators", "30.0", "50"],
            &["Unknown", "", "25"],
        ],
    );
    let (persons, stats) = persons_from_table(&table, &ClassifierOptions::default()).unwrap();
    assert_eq!(stats.occupation_column, "q17");
    assert_eq!(stats.weight_column, "ASECWT");
    assert_eq!(stats.missing_occupation, 1);
    assert_eq!(persons.len(), 3);
    assert_eq!(persons[0].occupation_code.as_ref().unwrap().as_str(), "0010");
    assert_eq!(persons[1].occupation_code.as_ref().unwrap().as_str(), "0030");
    assert!(persons[2].occupation_code.is_none());
}

#[test]
fn test_person_weight_requires_known_alias() {
    let table = table_from_rows(&["OCC", "w"], &[&["10", "1.0"]]);
    let err = persons_from_table(&table, &ClassifierOptions::default()).unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn test_pair_repicks_second_target_on_conflict() {
    let columns = vec![
        column("mixed", &["0010", "111011"]),
        column("sparse", &["x", "x", "x", "111021"]),
    ];
    let (occ, soc) = classify_pair(
        as_inputs(&columns),
        &CodeShape::Occupation,
        &CodeShape::Classification,
        &ClassifierOptions::default(),
    )
    .unwrap();
    assert_eq!(occ.name, "mixed");
    assert_eq!(soc.name, "sparse");
}

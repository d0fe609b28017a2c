use approx::assert_abs_diff_eq;
use chrono::{NaiveDate, NaiveDateTime};
use nalgebra::DMatrix;
use synth_control::estimator::{estimate, estimate_with_tolerance, SyntheticControl};
use synth_control::{ConsumptionMatrix, SynthError};

fn hours(count: usize, day: u32) -> Vec<NaiveDateTime> {
    (0..count)
        .map(|h| {
            NaiveDate::from_ymd_opt(2013, 1, day)
                .unwrap()
                .and_hms_opt(h as u32, 0, 0)
                .unwrap()
        })
        .collect()
}

fn houses(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn matrix(day: u32, names: &[&str], rows: &[Vec<f64>]) -> ConsumptionMatrix {
    ConsumptionMatrix::from_rows(hours(rows.len(), day), houses(names), rows).unwrap()
}

#[test]
fn test_documented_scenario() {
    // treatment1 = control1 · [[2], [2]]
    let control1 = matrix(1, &["A", "B"], &[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
    let treatment1 = matrix(1, &["T"], &[vec![6.0], vec![14.0], vec![22.0]]);
    let control2 = matrix(2, &["A", "B"], &[vec![1.0, 1.0], vec![2.0, 2.0]]);

    let result = estimate(&control1, &treatment1, &control2).unwrap();

    assert_eq!(result.shape(), (2, 1));
    assert_eq!(result.columns(), &houses(&["T"])[..]);
    assert_eq!(result.index(), control2.index());
    assert_abs_diff_eq!(result.values()[(0, 0)], 4.0, epsilon = 1e-9);
    assert_abs_diff_eq!(result.values()[(1, 0)], 8.0, epsilon = 1e-9);
}

#[test]
fn test_recovers_exact_linear_relationship() {
    let control1 = matrix(
        1,
        &["C1", "C2", "C3"],
        &[
            vec![0.2, 0.5, 0.1],
            vec![0.4, 0.3, 0.7],
            vec![0.9, 0.1, 0.3],
            vec![0.3, 0.8, 0.2],
            vec![0.6, 0.6, 0.9],
            vec![0.1, 0.2, 0.4],
        ],
    );
    let k = DMatrix::from_row_slice(3, 2, &[0.5, 0.1, 0.3, 0.6, 0.2, 0.3]);
    let treatment1 = ConsumptionMatrix::new(
        control1.index().to_vec(),
        houses(&["T1", "T2"]),
        control1.values() * &k,
    )
    .unwrap();
    let control2 = matrix(
        2,
        &["C1", "C2", "C3"],
        &[vec![0.7, 0.2, 0.5], vec![0.1, 0.9, 0.3], vec![0.4, 0.4, 0.4]],
    );

    let model = SyntheticControl::fit(&control1, &treatment1).unwrap();
    assert!(model.is_full_rank());
    assert_abs_diff_eq!(model.coefficients().clone(), k, epsilon = 1e-9);

    let result = model.predict(&control2).unwrap();
    let expected = control2.values() * &k;
    assert_abs_diff_eq!(result.values().clone(), expected, epsilon = 1e-9);
}

#[test]
fn test_predict_realigns_control_columns() {
    let control1 = matrix(1, &["A", "B"], &[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 7.0]]);
    let treatment1 = matrix(1, &["T"], &[vec![5.0], vec![11.0], vec![19.0]]);
    let control2 = matrix(2, &["A", "B"], &[vec![2.0, 1.0]]);
    let swapped = matrix(2, &["B", "A"], &[vec![1.0, 2.0]]);

    let model = SyntheticControl::fit(&control1, &treatment1).unwrap();
    let direct = model.predict(&control2).unwrap();
    let reordered = model.predict(&swapped).unwrap();

    assert_abs_diff_eq!(direct.values()[(0, 0)], 4.0, epsilon = 1e-9);
    assert_abs_diff_eq!(reordered.values()[(0, 0)], direct.values()[(0, 0)], epsilon = 1e-12);
}

#[test]
fn test_rank_deficient_control_panel() {
    // B duplicates A, so only their sum is identified
    let control1 = matrix(1, &["A", "B"], &[vec![1.0, 1.0], vec![2.0, 2.0], vec![3.0, 3.0]]);
    let treatment1 = matrix(1, &["T"], &[vec![2.0], vec![4.0], vec![6.0]]);
    let control2 = matrix(2, &["A", "B"], &[vec![5.0, 5.0]]);

    let model = SyntheticControl::fit(&control1, &treatment1).unwrap();
    assert_eq!(model.rank(), 1);
    assert!(!model.is_full_rank());

    // Minimum-norm solution splits the weight evenly
    let weights = model.weights_for("T").unwrap();
    assert_abs_diff_eq!(weights[0].1, 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(weights[1].1, 1.0, epsilon = 1e-9);

    let result = model.predict(&control2).unwrap();
    assert_abs_diff_eq!(result.values()[(0, 0)], 10.0, epsilon = 1e-9);
}

#[test]
fn test_row_count_mismatch_is_rejected() {
    let control1 = matrix(1, &["A"], &[vec![1.0], vec![2.0], vec![3.0]]);
    let treatment1 = matrix(1, &["T"], &[vec![1.0], vec![2.0]]);
    let control2 = matrix(2, &["A"], &[vec![1.0]]);

    let result = estimate(&control1, &treatment1, &control2);
    assert!(matches!(result, Err(SynthError::ShapeMismatch(_))));
}

#[test]
fn test_misaligned_timestamps_are_rejected() {
    let control1 = matrix(1, &["A"], &[vec![1.0], vec![2.0]]);
    let treatment1 = matrix(3, &["T"], &[vec![1.0], vec![2.0]]);
    let control2 = matrix(2, &["A"], &[vec![1.0]]);

    let result = estimate(&control1, &treatment1, &control2);
    assert!(matches!(result, Err(SynthError::ShapeMismatch(_))));
}

#[test]
fn test_control_house_mismatch_is_rejected() {
    let control1 = matrix(1, &["A", "B"], &[vec![1.0, 2.0], vec![3.0, 4.0]]);
    let treatment1 = matrix(1, &["T"], &[vec![1.0], vec![2.0]]);

    let fewer = matrix(2, &["A"], &[vec![1.0]]);
    let other = matrix(2, &["A", "C"], &[vec![1.0, 2.0]]);

    assert!(matches!(
        estimate(&control1, &treatment1, &fewer),
        Err(SynthError::HouseMismatch(_))
    ));
    assert!(matches!(
        estimate(&control1, &treatment1, &other),
        Err(SynthError::HouseMismatch(_))
    ));
}

#[test]
fn test_missing_values_are_rejected() {
    let control1 = matrix(1, &["A", "B"], &[vec![1.0, f64::NAN], vec![3.0, 4.0]]);
    let treatment1 = matrix(1, &["T"], &[vec![1.0], vec![2.0]]);
    let control2 = matrix(2, &["A", "B"], &[vec![1.0, 1.0]]);

    match estimate(&control1, &treatment1, &control2) {
        Err(SynthError::MissingValues { matrix, count }) => {
            assert_eq!(matrix, "control period 1");
            assert_eq!(count, 1);
        }
        other => panic!("Expected MissingValues, got {:?}", other),
    }

    let dense1 = matrix(1, &["A", "B"], &[vec![1.0, 2.0], vec![3.0, 4.0]]);
    let gappy2 = matrix(2, &["A", "B"], &[vec![f64::NAN, 1.0]]);
    assert!(matches!(
        estimate(&dense1, &treatment1, &gappy2),
        Err(SynthError::MissingValues { .. })
    ));
}

#[test]
fn test_empty_matrices_are_rejected() {
    let empty = ConsumptionMatrix::new(Vec::new(), houses(&["A"]), DMatrix::zeros(0, 1)).unwrap();
    let treatment1 = ConsumptionMatrix::new(Vec::new(), houses(&["T"]), DMatrix::zeros(0, 1)).unwrap();
    let control2 = matrix(2, &["A"], &[vec![1.0]]);

    assert!(matches!(
        estimate(&empty, &treatment1, &control2),
        Err(SynthError::EmptyMatrix(_))
    ));
}

#[test]
fn test_negative_tolerance_is_rejected() {
    let control1 = matrix(1, &["A"], &[vec![1.0]]);
    let treatment1 = matrix(1, &["T"], &[vec![1.0]]);

    let result = estimate_with_tolerance(&control1, &treatment1, &control1, -1.0);
    assert!(matches!(result, Err(SynthError::InvalidParameter(_))));
}

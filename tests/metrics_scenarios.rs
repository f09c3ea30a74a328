use approx::assert_abs_diff_eq;
use ferclass::eval::{finalize, ConfusionCounts, ConfusionMatrix};

#[test]
fn three_class_counts_and_metrics() {
    let y_true = [0, 0, 1, 2, 2, 2];
    let y_pred = [0, 1, 1, 2, 0, 2];

    // two batches through one accumulator
    let mut counts = ConfusionCounts::new();
    counts.update(&y_true[..4], &y_pred[..4]).unwrap();
    counts.update(&y_true[4..], &y_pred[4..]).unwrap();
    assert_eq!(counts.correct_total(), 4);

    let m = finalize(&counts, &y_true, &y_pred, 3, 6).unwrap();
    let expected = [(0.5, 0.5, 0.5), (0.5, 1.0, 2.0 / 3.0), (1.0, 2.0 / 3.0, 0.8)];
    for (class, (p, r, f1)) in expected.into_iter().enumerate() {
        let got = m.per_class(class);
        assert_abs_diff_eq!(got.precision, p, epsilon = 1e-12);
        assert_abs_diff_eq!(got.recall, r, epsilon = 1e-12);
        assert_abs_diff_eq!(got.f1, f1, epsilon = 1e-12);
    }
    assert_abs_diff_eq!(m.macro_f1, 0.6556, epsilon = 1e-4);
    assert_eq!(m.correct_labels, y_true);
    assert_eq!(m.predicted_labels, y_pred);
}

#[test]
fn accuracy_is_relative_to_declared_dataset_size() {
    let y_true = [0, 1, 2, 0, 1, 2, 0];
    let mut counts = ConfusionCounts::new();
    counts.update(&y_true, &y_true).unwrap();
    let m = finalize(&counts, &y_true, &y_true, 3, 10).unwrap();
    assert_abs_diff_eq!(m.overall_accuracy, 70.0, epsilon = 1e-12);
}

#[test]
fn unobserved_classes_count_as_zero_in_macro_f1() {
    // 7 configured classes, only 0..5 ever appear
    let y_true = [0, 1, 2, 3, 4, 0, 1];
    let y_pred = [0, 1, 2, 3, 4, 1, 1];
    let mut counts = ConfusionCounts::new();
    counts.update(&y_true, &y_pred).unwrap();
    let m = finalize(&counts, &y_true, &y_pred, 7, y_true.len()).unwrap();

    let f1_sum: f64 = (0..5).map(|c| m.per_class(c).f1).sum();
    assert_abs_diff_eq!(m.macro_f1, f1_sum / 7.0, epsilon = 1e-12);
    assert_eq!(m.per_class_f1[&5], 0.0);
    assert_eq!(m.per_class_f1[&6], 0.0);

    // the reference macros only average over the five observed labels
    let p_sum: f64 = (0..5).map(|c| m.per_class(c).precision).sum();
    assert_abs_diff_eq!(m.macro_precision, p_sum / 5.0, epsilon = 1e-12);
}

#[test]
fn finalize_is_idempotent() {
    let y_true = [3, 1, 1, 0, 2];
    let y_pred = [3, 0, 1, 0, 0];
    let mut counts = ConfusionCounts::new();
    counts.update(&y_true, &y_pred).unwrap();
    let before = counts.clone();

    let a = finalize(&counts, &y_true, &y_pred, 4, 5).unwrap();
    let b = finalize(&counts, &y_true, &y_pred, 4, 5).unwrap();
    assert_eq!(a, b);
    assert_eq!(counts, before);
}

#[test]
fn confusion_matrix_from_metrics_labels() {
    let y_true = [0, 0, 1, 2, 2, 2];
    let y_pred = [0, 1, 1, 2, 0, 2];
    let mut counts = ConfusionCounts::new();
    counts.update(&y_true, &y_pred).unwrap();
    let m = finalize(&counts, &y_true, &y_pred, 3, 6).unwrap();

    let cm = ConfusionMatrix::from_labels(&m.correct_labels, &m.predicted_labels, m.num_classes()).unwrap();
    let diagonal: usize = (0..3).map(|c| cm.get(c, c)).sum();
    assert_eq!(diagonal, counts.correct_total());
    for class in 0..3 {
        let row: usize = cm.counts()[class].iter().sum();
        assert_eq!(row, counts.total_for(class));
    }
}

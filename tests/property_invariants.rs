use ferclass::eval::{finalize, ConfusionCounts};
use proptest::prelude::*;

const NUM_CLASSES: usize = 7;

fn label_pairs() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..NUM_CLASSES, 0..NUM_CLASSES), 1..200)
}

fn accumulate(pairs: &[(usize, usize)], batch: usize) -> (ConfusionCounts, Vec<usize>, Vec<usize>) {
    let y_true: Vec<usize> = pairs.iter().map(|p| p.0).collect();
    let y_pred: Vec<usize> = pairs.iter().map(|p| p.1).collect();
    let mut counts = ConfusionCounts::new();
    for (t, p) in y_true.chunks(batch).zip(y_pred.chunks(batch)) {
        counts.update(t, p).unwrap();
    }
    (counts, y_true, y_pred)
}

proptest! {
    #[test]
    fn counts_stay_consistent(pairs in label_pairs(), batch in 1usize..32) {
        let (counts, y_true, _) = accumulate(&pairs, batch);
        prop_assert!(counts.is_consistent());
        prop_assert_eq!(counts.total_samples(), y_true.len());
    }

    #[test]
    fn batching_does_not_change_counts(pairs in label_pairs(), batch in 1usize..32) {
        let (whole, _, _) = accumulate(&pairs, pairs.len());
        let (chunked, _, _) = accumulate(&pairs, batch);
        prop_assert_eq!(whole, chunked);
    }

    #[test]
    fn rates_are_bounded_and_finite(pairs in label_pairs(), batch in 1usize..32) {
        let (counts, y_true, y_pred) = accumulate(&pairs, batch);
        let m = finalize(&counts, &y_true, &y_pred, NUM_CLASSES, y_true.len()).unwrap();
        for class in 0..NUM_CLASSES {
            let c = m.per_class(class);
            for v in [c.precision, c.recall, c.f1] {
                prop_assert!(v.is_finite());
                prop_assert!((0.0..=1.0).contains(&v));
            }
        }
        for v in [m.macro_precision, m.macro_recall, m.macro_f1, m.weighted_f1] {
            prop_assert!((0.0..=1.0 + 1e-12).contains(&v));
        }
        prop_assert!((0.0..=100.0 + 1e-9).contains(&m.overall_accuracy));
    }

    #[test]
    fn macro_f1_divides_by_configured_classes(pairs in label_pairs()) {
        let (counts, y_true, y_pred) = accumulate(&pairs, 16);
        let m = finalize(&counts, &y_true, &y_pred, NUM_CLASSES, y_true.len()).unwrap();
        let sum: f64 = m.per_class_f1.values().sum();
        prop_assert!((m.macro_f1 - sum / NUM_CLASSES as f64).abs() < 1e-12);
    }

    #[test]
    fn reference_macros_match_per_class_when_all_classes_occur(pairs in label_pairs()) {
        let (counts, y_true, y_pred) = accumulate(&pairs, 16);
        let mut seen: Vec<usize> = y_true.iter().chain(y_pred.iter()).copied().collect();
        seen.sort_unstable();
        seen.dedup();
        prop_assume!(seen.len() == NUM_CLASSES);

        let m = finalize(&counts, &y_true, &y_pred, NUM_CLASSES, y_true.len()).unwrap();
        let mean_p = m.per_class_precision.values().sum::<f64>() / NUM_CLASSES as f64;
        let mean_r = m.per_class_recall.values().sum::<f64>() / NUM_CLASSES as f64;
        prop_assert!((m.macro_precision - mean_p).abs() < 1e-9);
        prop_assert!((m.macro_recall - mean_r).abs() < 1e-9);
    }

    #[test]
    fn finalize_twice_is_identical(pairs in label_pairs()) {
        let (counts, y_true, y_pred) = accumulate(&pairs, 8);
        let a = finalize(&counts, &y_true, &y_pred, NUM_CLASSES, y_true.len()).unwrap();
        let b = finalize(&counts, &y_true, &y_pred, NUM_CLASSES, y_true.len()).unwrap();
        prop_assert_eq!(a, b);
    }
}

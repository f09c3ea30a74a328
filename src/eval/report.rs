use crate::eval::metrics::AggregateMetrics;

/// Plain-text per-class table followed by the aggregate figures.
///
/// `class_names` is used for row labels when it has one entry per class.
pub fn classification_report(metrics: &AggregateMetrics, class_names: &[String]) -> String {
    let n = metrics.num_classes();
    let names: Vec<String> = if class_names.len() == n {
        class_names.to_vec()
    } else {
        (0..n).map(|c| format!("class {c}")).collect()
    };
    let width = names.iter().map(String::len).max().unwrap_or(0).max(12);
    let support = metrics.support();

    let mut report = format!(
        "{:>width$} {:>10} {:>10} {:>10} {:>10}\n",
        "", "precision", "recall", "f1-score", "support"
    );
    let rule = "-".repeat(width + 44);
    report.push_str(&rule);
    report.push('\n');

    for (class, name) in names.iter().enumerate() {
        let m = metrics.per_class(class);
        report.push_str(&format!(
            "{:>width$} {:>10.4} {:>10.4} {:>10.4} {:>10}\n",
            name, m.precision, m.recall, m.f1, support[class]
        ));
    }

    report.push_str(&rule);
    report.push('\n');
    let total: usize = support.iter().sum();
    report.push_str(&format!(
        "{:>width$} {:>10.4} {:>10.4} {:>10.4} {:>10}\n",
        "macro avg", metrics.macro_precision, metrics.macro_recall, metrics.macro_f1, total
    ));
    report.push_str(&format!(
        "{:>width$} {:>10} {:>10} {:>10.4} {:>10}\n",
        "weighted avg", "", "", metrics.weighted_f1, total
    ));
    report.push_str(&format!("\nAccuracy: {:.2}%\n", metrics.overall_accuracy));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{accumulator::ConfusionCounts, metrics::finalize};

    #[test]
    fn test_report_lists_every_class() {
        let y_true = [0, 0, 1, 2];
        let y_pred = [0, 1, 1, 2];
        let mut counts = ConfusionCounts::new();
        counts.update(&y_true, &y_pred).unwrap();
        let metrics = finalize(&counts, &y_true, &y_pred, 3, 4).unwrap();

        let names: Vec<String> = ["angry", "happy", "sad"].iter().map(|s| s.to_string()).collect();
        let text = classification_report(&metrics, &names);
        for name in &names {
            assert!(text.contains(name.as_str()));
        }
        assert!(text.contains("macro avg"));
        assert!(text.contains("Accuracy: 75.00%"));

        let fallback = classification_report(&metrics, &[]);
        assert!(fallback.contains("class 2"));
    }
}

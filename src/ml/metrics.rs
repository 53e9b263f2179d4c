use crate::ml::codec::CategoryCodec;
use crate::ml::models::{ClassMetrics, ConfusionMatrix, ModelMetrics};

/// Share of predictions equal to the true label
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Precision, recall, F1 and support for every class index in `0..n_classes`.
///
/// Undefined ratios (no predictions or no support for a class) count as zero.
pub fn per_class_metrics(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Vec<ClassMetrics> {
    let mut tp = vec![0usize; n_classes];
    let mut fp = vec![0usize; n_classes];
    let mut fn_count = vec![0usize; n_classes];
    let mut support = vec![0usize; n_classes];

    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        if t < n_classes {
            support[t] += 1;
        }
        if t == p {
            if t < n_classes {
                tp[t] += 1;
            }
        } else {
            if p < n_classes {
                fp[p] += 1;
            }
            if t < n_classes {
                fn_count[t] += 1;
            }
        }
    }

    (0..n_classes)
        .map(|c| {
            let precision = ratio(tp[c], tp[c] + fp[c]);
            let recall = ratio(tp[c], tp[c] + fn_count[c]);
            let f1_score = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            ClassMetrics {
                precision,
                recall,
                f1_score,
                support: support[c],
            }
        })
        .collect()
}

/// Per-class F1 averaged with class support as weight
pub fn weighted_f1(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> f64 {
    let per_class = per_class_metrics(y_true, y_pred, n_classes);
    let total: usize = per_class.iter().map(|m| m.support).sum();
    if total == 0 {
        return 0.0;
    }

    per_class
        .iter()
        .map(|m| m.f1_score * m.support as f64)
        .sum::<f64>()
        / total as f64
}

/// Accuracy, weighted F1 and the per-class report keyed by category label
pub fn evaluate(y_true: &[usize], y_pred: &[usize], codec: &CategoryCodec) -> ModelMetrics {
    let n_classes = codec.n_classes();
    let mut metrics = ModelMetrics::new(
        accuracy(y_true, y_pred),
        weighted_f1(y_true, y_pred, n_classes),
    );

    for (label, class) in codec
        .classes()
        .iter()
        .zip(per_class_metrics(y_true, y_pred, n_classes))
    {
        metrics.per_class.insert(label.clone(), class);
    }

    metrics
}

/// Count (actual, predicted) pairs; rows follow the codec's label order
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], codec: &CategoryCodec) -> ConfusionMatrix {
    let n_classes = codec.n_classes();
    let mut counts = vec![vec![0usize; n_classes]; n_classes];

    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        if t < n_classes && p < n_classes {
            counts[t][p] += 1;
        }
    }

    ConfusionMatrix {
        labels: codec.classes().to_vec(),
        counts,
    }
}

/// Render a per-class report as aligned text for logs
pub fn format_report(metrics: &ModelMetrics) -> String {
    let width = metrics
        .per_class
        .keys()
        .map(String::len)
        .max()
        .unwrap_or(0)
        .max("weighted avg".len());

    let mut out = format!(
        "{:>width$}  precision  recall  f1-score  support\n",
        "",
        width = width
    );
    let mut total = 0;
    for (label, class) in &metrics.per_class {
        total += class.support;
        out.push_str(&format!(
            "{:>width$}  {:>9.2}  {:>6.2}  {:>8.2}  {:>7}\n",
            label,
            class.precision,
            class.recall,
            class.f1_score,
            class.support,
            width = width
        ));
    }
    out.push_str(&format!(
        "{:>width$}  {:>9}  {:>6}  {:>8.2}  {:>7}\n",
        "accuracy",
        "",
        "",
        metrics.accuracy,
        total,
        width = width
    ));
    out.push_str(&format!(
        "{:>width$}  {:>9}  {:>6}  {:>8.2}  {:>7}\n",
        "weighted avg",
        "",
        "",
        metrics.f1_score,
        total,
        width = width
    ));
    out
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

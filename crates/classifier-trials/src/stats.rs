use std::fmt;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrialError};

fn check_same_length(a: usize, b: usize, what: &str) -> Result<()> {
    if a != b {
        return Err(TrialError::invalid_input(format!(
            "{}: inputs have different lengths ({} vs {})",
            what, a, b
        )));
    }
    if a == 0 {
        return Err(TrialError::invalid_input(format!("{}: inputs are empty", what)));
    }
    Ok(())
}

/// Fraction of predictions equal to the true labels.
pub fn accuracy_score(y_true: &Array1<i32>, y_pred: &Array1<i32>) -> Result<f64> {
    check_same_length(y_true.len(), y_pred.len(), "accuracy_score")?;
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Compute the ROC curve and its area for binary labels.
///
/// The positive class is the greater of the two labels present in `y_true`.
/// One curve point is emitted per distinct score, walking thresholds from the
/// highest score down; the curve starts at (0, 0) and ends at (1, 1). The
/// area is integrated with the trapezoidal rule.
///
/// # Returns
///
/// `(fpr, tpr, auc)`
pub fn custom_roc_auc(y_true: &Array1<i32>, scores: &Array1<f64>) -> Result<(Vec<f64>, Vec<f64>, f64)> {
    check_same_length(y_true.len(), scores.len(), "custom_roc_auc")?;
    if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
        return Err(TrialError::invalid_input(format!(
            "custom_roc_auc: scores must be finite, found {}",
            bad
        )));
    }

    let mut labels: Vec<i32> = y_true.to_vec();
    labels.sort_unstable();
    labels.dedup();
    if labels.len() != 2 {
        return Err(TrialError::invalid_input(format!(
            "custom_roc_auc: ROC AUC needs exactly two classes in y_true, found {}",
            labels.len()
        )));
    }
    let positive = labels[1];

    let n_pos = y_true.iter().filter(|&&l| l == positive).count() as f64;
    let n_neg = y_true.len() as f64 - n_pos;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let (mut tp, mut fp) = (0.0, 0.0);
    for (rank, &idx) in order.iter().enumerate() {
        if y_true[idx] == positive {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_tie = order
            .get(rank + 1)
            .map_or(true, |&next| scores[next] != scores[idx]);
        if last_of_tie {
            fpr.push(fp / n_neg);
            tpr.push(tp / n_pos);
        }
    }

    let auc = fpr
        .windows(2)
        .zip(tpr.windows(2))
        .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
        .sum::<f64>();

    Ok((fpr, tpr, auc.clamp(0.0, 1.0)))
}

/// Area under the ROC curve only.
pub fn roc_auc_score(y_true: &Array1<i32>, scores: &Array1<f64>) -> Result<f64> {
    custom_roc_auc(y_true, scores).map(|(_, _, auc)| auc)
}

/// Precision / recall / F1 for one class or one average row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class and averaged metrics of a set of predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<(i32, ClassMetrics)>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Build a classification report; undefined ratios are reported as 0.
pub fn classification_report(y_true: &Array1<i32>, y_pred: &Array1<i32>) -> Result<ClassificationReport> {
    let accuracy = accuracy_score(y_true, y_pred)?;

    let mut labels: Vec<i32> = y_true.iter().chain(y_pred.iter()).copied().collect();
    labels.sort_unstable();
    labels.dedup();

    let total = y_true.len();
    let mut classes = Vec::with_capacity(labels.len());
    for &label in &labels {
        let mut tp = 0;
        let mut predicted = 0;
        let mut support = 0;
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if p == label {
                predicted += 1;
                if t == label {
                    tp += 1;
                }
            }
            if t == label {
                support += 1;
            }
        }
        let precision = ratio(tp, predicted);
        let recall = ratio(tp, support);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        classes.push((
            label,
            ClassMetrics {
                precision,
                recall,
                f1_score,
                support,
            },
        ));
    }

    let n_classes = classes.len() as f64;
    let macro_avg = ClassMetrics {
        precision: classes.iter().map(|(_, m)| m.precision).sum::<f64>() / n_classes,
        recall: classes.iter().map(|(_, m)| m.recall).sum::<f64>() / n_classes,
        f1_score: classes.iter().map(|(_, m)| m.f1_score).sum::<f64>() / n_classes,
        support: total,
    };
    let weight = |m: &ClassMetrics| m.support as f64 / total as f64;
    let weighted_avg = ClassMetrics {
        precision: classes.iter().map(|(_, m)| m.precision * weight(m)).sum(),
        recall: classes.iter().map(|(_, m)| m.recall * weight(m)).sum(),
        f1_score: classes.iter().map(|(_, m)| m.f1_score * weight(m)).sum(),
        support: total,
    };

    Ok(ClassificationReport {
        classes,
        accuracy,
        macro_avg,
        weighted_avg,
    })
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|(label, _)| label.to_string().len())
            .max()
            .unwrap_or(0)
            .max("weighted avg".len());

        let row = |f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics| {
            writeln!(
                f,
                "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name,
                m.precision,
                m.recall,
                m.f1_score,
                m.support,
                width = width
            )
        };

        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9} {:>9}",
            "",
            "precision",
            "recall",
            "f1-score",
            "support",
            width = width
        )?;
        writeln!(f)?;
        for (label, metrics) in &self.classes {
            row(f, &label.to_string(), metrics)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.macro_avg.support,
            width = width
        )?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, "weighted avg", &self.weighted_avg)
    }
}

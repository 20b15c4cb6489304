//! Classification metrics and the text classification report

use crate::preprocessing::ClassLabel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

const HEADERS: [&str; 4] = ["precision", "recall", "f1-score", "support"];
const LONGEST_AVG_NAME: &str = "weighted avg";

/// Fraction of exact matches; 0 for empty input
pub fn accuracy_score<T: PartialEq>(y_true: &[T], y_pred: &[T]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(a, b)| a == b).count();
    correct as f64 / y_true.len() as f64
}

/// Mean recall over the classes present in `y_true`
pub fn balanced_accuracy_score<T: Ord + Clone>(y_true: &[T], y_pred: &[T]) -> f64 {
    let counts = confusion_counts(y_true, y_pred);
    let recalls: Vec<f64> = counts
        .values()
        .filter(|c| c.support > 0)
        .map(|c| c.recall())
        .collect();
    if recalls.is_empty() {
        0.0
    } else {
        recalls.iter().sum::<f64>() / recalls.len() as f64
    }
}

/// Unweighted mean F1 over the union of true and predicted classes
pub fn f1_macro_score<T: Ord + Clone>(y_true: &[T], y_pred: &[T]) -> f64 {
    let counts = confusion_counts(y_true, y_pred);
    if counts.is_empty() {
        return 0.0;
    }
    counts.values().map(|c| c.f1()).sum::<f64>() / counts.len() as f64
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    true_positive: usize,
    predicted: usize,
    support: usize,
}

impl Counts {
    fn precision(&self) -> f64 {
        ratio(self.true_positive, self.predicted)
    }

    fn recall(&self) -> f64 {
        ratio(self.true_positive, self.support)
    }

    fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Per-class counts keyed by the sorted union of true and predicted labels
fn confusion_counts<T: Ord + Clone>(y_true: &[T], y_pred: &[T]) -> BTreeMap<T, Counts> {
    let labels: BTreeSet<T> = y_true.iter().chain(y_pred).cloned().collect();
    let mut counts: BTreeMap<T, Counts> =
        labels.into_iter().map(|l| (l, Counts::default())).collect();

    for (t, p) in y_true.iter().zip(y_pred) {
        if let Some(c) = counts.get_mut(t) {
            c.support += 1;
            if t == p {
                c.true_positive += 1;
            }
        }
        if let Some(c) = counts.get_mut(p) {
            c.predicted += 1;
        }
    }
    counts
}

/// Precision, recall, F1 and support of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: ClassLabel,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// An averaged report row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class metrics with accuracy, macro and support-weighted averages.
///
/// Any ratio with a zero denominator is reported as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    digits: usize,
}

impl ClassificationReport {
    pub fn compute(y_true: &[ClassLabel], y_pred: &[ClassLabel]) -> Self {
        let counts = confusion_counts(y_true, y_pred);
        let classes: Vec<ClassMetrics> = counts
            .into_iter()
            .map(|(label, c)| ClassMetrics {
                label,
                precision: c.precision(),
                recall: c.recall(),
                f1_score: c.f1(),
                support: c.support,
            })
            .collect();

        let total: usize = classes.iter().map(|c| c.support).sum();
        let n = classes.len() as f64;
        let mean = |f: fn(&ClassMetrics) -> f64| {
            if classes.is_empty() {
                0.0
            } else {
                classes.iter().map(f).sum::<f64>() / n
            }
        };
        let weighted = |f: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                classes.iter().map(|c| f(c) * c.support as f64).sum::<f64>() / total as f64
            }
        };

        let macro_avg = AverageMetrics {
            precision: mean(|c| c.precision),
            recall: mean(|c| c.recall),
            f1_score: mean(|c| c.f1_score),
            support: total,
        };
        let weighted_avg = AverageMetrics {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1_score: weighted(|c| c.f1_score),
            support: total,
        };

        Self {
            accuracy: accuracy_score(y_true, y_pred),
            classes,
            macro_avg,
            weighted_avg,
            digits: 2,
        }
    }

    /// Number of decimals in the rendered text
    pub fn with_digits(mut self, digits: usize) -> Self {
        self.digits = digits;
        self
    }

    pub fn class(&self, label: &ClassLabel) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| &c.label == label)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.digits;
        let names: Vec<String> = self.classes.iter().map(|c| c.label.to_string()).collect();
        let width = names
            .iter()
            .map(|n| n.chars().count())
            .max()
            .unwrap_or(0)
            .max(LONGEST_AVG_NAME.len())
            .max(d);

        write!(f, "{:>width$} ", "")?;
        for h in HEADERS {
            write!(f, " {:>9}", h)?;
        }
        write!(f, "\n\n")?;

        let row = |f: &mut fmt::Formatter<'_>, name: &str, p: f64, r: f64, f1: f64, s: usize| {
            writeln!(f, "{:>width$}  {:>9.d$} {:>9.d$} {:>9.d$} {:>9}", name, p, r, f1, s)
        };

        for (name, c) in names.iter().zip(&self.classes) {
            row(f, name, c.precision, c.recall, c.f1_score, c.support)?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9.d$} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            row(f, name, avg.precision, avg.recall, avg.f1_score, avg.support)?;
        }
        Ok(())
    }
}

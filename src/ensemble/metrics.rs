//! Test-set accuracy and per-class precision/recall/F1.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fraction of predictions equal to the true label.
pub fn accuracy(predicted: &[usize], actual: &[usize]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(actual)
        .filter(|(p, a)| p == a)
        .count();
    correct as f64 / actual.len() as f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ClassificationReport {
    /// Build a report over `names.len()` classes.
    ///
    /// Undefined precision or recall (no predictions or no support) counts
    /// as zero.
    pub fn new(predicted: &[usize], actual: &[usize], names: &[String]) -> Self {
        let k = names.len();
        let mut tp = vec![0usize; k];
        let mut predicted_count = vec![0usize; k];
        let mut support = vec![0usize; k];
        for (&p, &a) in predicted.iter().zip(actual) {
            if p < k {
                predicted_count[p] += 1;
            }
            if a < k {
                support[a] += 1;
                if p == a {
                    tp[a] += 1;
                }
            }
        }

        let classes: Vec<ClassMetrics> = names
            .iter()
            .enumerate()
            .map(|(c, name)| {
                let precision = ratio(tp[c], predicted_count[c]);
                let recall = ratio(tp[c], support[c]);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    name: name.clone(),
                    precision,
                    recall,
                    f1,
                    support: support[c],
                }
            })
            .collect();

        let total: usize = support.iter().sum();
        let average = |name: &str, weight: &dyn Fn(&ClassMetrics) -> f64, norm: f64| {
            let norm = if norm > 0.0 { norm } else { 1.0 };
            ClassMetrics {
                name: name.to_string(),
                precision: classes.iter().map(|m| m.precision * weight(m)).sum::<f64>() / norm,
                recall: classes.iter().map(|m| m.recall * weight(m)).sum::<f64>() / norm,
                f1: classes.iter().map(|m| m.f1 * weight(m)).sum::<f64>() / norm,
                support: total,
            }
        };
        let macro_avg = average("macro avg", &|_| 1.0, k as f64);
        let weighted_avg = average("weighted avg", &|m| m.support as f64, total as f64);

        Self {
            accuracy: accuracy(predicted, actual),
            classes,
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.name.len())
            .chain(["weighted avg".len()])
            .max()
            .unwrap_or(12);
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for class in &self.classes {
            write_row(f, class, width)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        write_row(f, &self.macro_avg, width)?;
        write_row(f, &self.weighted_avg, width)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, m: &ClassMetrics, width: usize) -> fmt::Result {
    writeln!(
        f,
        "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        m.name, m.precision, m.recall, m.f1, m.support
    )
}

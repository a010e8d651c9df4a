//! Classification metrics.
//!
//! Per-class precision/recall/F1/support derived from a confusion matrix,
//! with macro and support-weighted aggregates. Macro averages are taken over
//! classes that actually occur in the ground truth (support > 0); a class
//! with support but no predictions gets precision 0.

use serde::{Deserialize, Serialize};

/// Aggregate metrics for one evaluation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    /// Total number of samples evaluated
    pub total_samples: usize,

    /// Number of correct predictions
    pub correct_predictions: usize,

    /// Overall accuracy (correct / total)
    pub accuracy: f64,

    /// Macro-averaged precision
    pub macro_precision: f64,

    /// Macro-averaged recall
    pub macro_recall: f64,

    /// Macro-averaged F1, the monitored metric during training
    pub macro_f1: f64,

    /// F1 weighted by class frequency
    pub weighted_f1: f64,

    /// Per-class metrics, indexed by label
    pub per_class: Vec<ClassMetrics>,

    /// Confusion matrix (rows = actual, columns = predicted)
    pub confusion_matrix: ConfusionMatrix,
}

impl Metrics {
    /// Compute metrics from parallel prediction and ground-truth slices.
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        assert_eq!(
            predictions.len(),
            ground_truth.len(),
            "predictions and ground truth must have the same length"
        );

        let total_samples = predictions.len();
        if total_samples == 0 {
            return Self::empty(num_classes);
        }

        let confusion_matrix =
            ConfusionMatrix::from_predictions(predictions, ground_truth, num_classes);

        let correct_predictions = confusion_matrix.correct();
        let accuracy = correct_predictions as f64 / total_samples as f64;

        let per_class: Vec<ClassMetrics> = (0..num_classes)
            .map(|class_idx| ClassMetrics::from_confusion_matrix(&confusion_matrix, class_idx))
            .collect();

        let represented: Vec<&ClassMetrics> =
            per_class.iter().filter(|m| m.support > 0).collect();
        let num_represented = represented.len() as f64;

        let (macro_precision, macro_recall, macro_f1) = if num_represented > 0.0 {
            (
                represented.iter().map(|m| m.precision).sum::<f64>() / num_represented,
                represented.iter().map(|m| m.recall).sum::<f64>() / num_represented,
                represented.iter().map(|m| m.f1).sum::<f64>() / num_represented,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        let total_support: usize = per_class.iter().map(|m| m.support).sum();
        let weighted_f1 = if total_support > 0 {
            per_class
                .iter()
                .map(|m| m.f1 * m.support as f64)
                .sum::<f64>()
                / total_support as f64
        } else {
            0.0
        };

        Self {
            total_samples,
            correct_predictions,
            accuracy,
            macro_precision,
            macro_recall,
            macro_f1,
            weighted_f1,
            per_class,
            confusion_matrix,
        }
    }

    fn empty(num_classes: usize) -> Self {
        Self {
            total_samples: 0,
            correct_predictions: 0,
            accuracy: 0.0,
            macro_precision: 0.0,
            macro_recall: 0.0,
            macro_f1: 0.0,
            weighted_f1: 0.0,
            per_class: Vec::new(),
            confusion_matrix: ConfusionMatrix::new(num_classes),
        }
    }

    /// One-line summary for logging
    pub fn summary(&self) -> String {
        format!(
            "acc {:.4} | macro-F1 {:.4} | macro-P {:.4} | macro-R {:.4} ({} samples)",
            self.accuracy, self.macro_f1, self.macro_precision, self.macro_recall,
            self.total_samples
        )
    }
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Metrics for a single class
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Class index
    pub class_idx: usize,

    /// True positives
    pub true_positives: usize,

    /// False positives
    pub false_positives: usize,

    /// False negatives
    pub false_negatives: usize,

    /// Precision = TP / (TP + FP), 0 when the class was never predicted
    pub precision: f64,

    /// Recall = TP / (TP + FN)
    pub recall: f64,

    /// F1 = 2PR / (P + R)
    pub f1: f64,

    /// Number of ground-truth samples of this class
    pub support: usize,
}

impl ClassMetrics {
    /// Derive one class's metrics from a confusion matrix.
    pub fn from_confusion_matrix(cm: &ConfusionMatrix, class_idx: usize) -> Self {
        let true_positives = cm.get(class_idx, class_idx);

        let false_positives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(i, class_idx))
            .sum();

        let false_negatives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(class_idx, i))
            .sum();

        let support = true_positives + false_negatives;

        let precision = if true_positives + false_positives > 0 {
            true_positives as f64 / (true_positives + false_positives) as f64
        } else {
            0.0
        };

        let recall = if support > 0 {
            true_positives as f64 / support as f64
        } else {
            0.0
        };

        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            class_idx,
            true_positives,
            false_positives,
            false_negatives,
            precision,
            recall,
            f1,
            support,
        }
    }
}

/// Confusion matrix for multi-class classification.
///
/// Stored row-major; row = actual class, column = predicted class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Number of classes
    pub num_classes: usize,

    /// Flat counts in row-major order
    pub matrix: Vec<usize>,
}

impl ConfusionMatrix {
    /// Create an empty matrix
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    /// Build a matrix from parallel prediction and ground-truth slices.
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        let mut cm = Self::new(num_classes);
        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            cm.add(actual, pred);
        }
        cm
    }

    /// Record a single prediction
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted] += 1;
        }
    }

    /// Count at (actual, predicted)
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    /// Total number of recorded samples
    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    /// Diagonal sum
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    /// Overall accuracy
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total > 0 {
            self.correct() as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Render the matrix for console inspection.
    pub fn display(&self, class_names: Option<&[String]>) -> String {
        let mut output = String::new();
        output.push_str("\nConfusion matrix (rows=actual, cols=predicted):\n\n");

        let label = |idx: usize| -> String {
            match class_names.and_then(|n| n.get(idx)) {
                Some(name) => {
                    let end = name.len().min(9);
                    name[..end].to_string()
                }
                None => idx.to_string(),
            }
        };

        output.push_str("           ");
        for col in 0..self.num_classes {
            output.push_str(&format!("{:>10}", label(col)));
        }
        output.push('\n');

        for row in 0..self.num_classes {
            output.push_str(&format!("{:>10} ", label(row)));
            for col in 0..self.num_classes {
                let count = self.get(row, col);
                if row == col {
                    output.push_str(&format!("  [{:>5}] ", count));
                } else if count > 0 {
                    output.push_str(&format!("   {:>5}  ", count));
                } else {
                    output.push_str("       .  ");
                }
            }
            output.push('\n');
        }

        output.push_str(&format!("\naccuracy: {:.2}%\n", self.accuracy() * 100.0));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_counts() {
        let predictions = vec![0, 1, 2, 0, 1, 2, 0, 0, 2, 2];
        let ground_truth = vec![0, 1, 2, 0, 2, 2, 1, 0, 1, 2];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 3);

        assert_eq!(cm.get(0, 0), 3);
        assert_eq!(cm.get(1, 1), 1);
        assert_eq!(cm.get(2, 2), 3);
        assert_eq!(cm.total(), 10);
        assert_eq!(cm.correct(), 7);
        assert!((cm.accuracy() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_class_metrics_from_matrix() {
        let predictions = vec![0, 0, 0, 1, 1];
        let ground_truth = vec![0, 0, 1, 1, 0];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 2);
        let class0 = ClassMetrics::from_confusion_matrix(&cm, 0);

        assert_eq!(class0.true_positives, 2);
        assert_eq!(class0.false_positives, 1);
        assert_eq!(class0.false_negatives, 1);
        assert!((class0.precision - 2.0 / 3.0).abs() < 1e-9);
        assert!((class0.recall - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_predictor_degenerate_case() {
        // Six samples, balanced over three classes, model always predicts 0.
        let ground_truth = vec![0, 0, 1, 1, 2, 2];
        let predictions = vec![0; 6];

        let metrics = Metrics::from_predictions(&predictions, &ground_truth, 3);

        let c0 = &metrics.per_class[0];
        assert!((c0.precision - 1.0 / 3.0).abs() < 1e-9);
        assert!((c0.recall - 1.0).abs() < 1e-9);
        assert_eq!(c0.support, 2);

        for class in &metrics.per_class[1..] {
            assert_eq!(class.precision, 0.0);
            assert_eq!(class.recall, 0.0);
            assert_eq!(class.f1, 0.0);
            assert_eq!(class.support, 2);
        }

        assert!((metrics.accuracy - 1.0 / 3.0).abs() < 1e-9);
        // Macro-F1 averages over all three represented classes.
        let f1_0 = 2.0 * (1.0 / 3.0) / (1.0 / 3.0 + 1.0);
        assert!((metrics.macro_f1 - f1_0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_macro_f1_ignores_absent_classes() {
        // Class 2 never occurs in the ground truth and is never predicted.
        let ground_truth = vec![0, 0, 1, 1];
        let predictions = vec![0, 0, 1, 1];

        let metrics = Metrics::from_predictions(&predictions, &ground_truth, 3);
        assert!((metrics.macro_f1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        let metrics = Metrics::from_predictions(&[], &[], 6);
        assert_eq!(metrics.total_samples, 0);
        assert_eq!(metrics.macro_f1, 0.0);
    }
}

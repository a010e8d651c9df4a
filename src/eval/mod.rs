//! Model evaluation: per-class reports, confusion matrix, per-sample
//! prediction records, and the test-time-augmented variant.
//!
//! Plain and augmented passes differ only in how a batch's label decisions
//! are produced; both feed the same [`Metrics`] computation, so their
//! numbers are directly comparable. The evaluator's only side effect is
//! writing the report and prediction CSVs; the model and dataset are never
//! mutated.

use std::path::{Path, PathBuf};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use tracing::info;

use crate::dataset::augmentation::TTA_VIEWS;
use crate::dataset::batcher::{WasteBatch, WasteBatcher, WasteItem, WasteTensorDataset};
use crate::model::WasteNet;
use crate::utils::error::Result;
use crate::utils::metrics::Metrics;

/// One evaluated sample
#[derive(Debug, Clone)]
pub struct EvaluationRecord {
    /// Sample identifier (source path)
    pub path: String,
    /// Ground-truth label index
    pub truth: usize,
    /// Predicted label index
    pub predicted: usize,
}

/// Everything one evaluation pass produces
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    /// Aggregate and per-class metrics, including the confusion matrix
    pub metrics: Metrics,
    /// Per-sample records, in dataset order
    pub records: Vec<EvaluationRecord>,
}

/// Applies a trained model to a labeled evaluation set
pub struct Evaluator<'a, B: Backend> {
    model: &'a WasteNet<B>,
    device: B::Device,
    batch_size: usize,
    class_names: Vec<String>,
}

impl<'a, B: Backend> Evaluator<'a, B> {
    pub fn new(
        model: &'a WasteNet<B>,
        device: B::Device,
        batch_size: usize,
        class_names: Vec<String>,
    ) -> Self {
        Self {
            model,
            device,
            batch_size,
            class_names,
        }
    }

    /// Single-view evaluation pass.
    pub fn evaluate(&self, dataset: &WasteTensorDataset) -> EvaluationReport {
        let batcher = WasteBatcher::new(dataset.image_size());
        self.run_pass(dataset, |items| {
            let batch: WasteBatch<B> = batcher.batch(items.to_vec(), &self.device);
            let probs = self.model.forward_softmax(batch.images);
            argmax_labels(probs)
        })
    }

    /// Test-time-augmented pass: softmax probabilities averaged across the
    /// deterministic dihedral views before taking the decision label.
    pub fn evaluate_tta(&self, dataset: &WasteTensorDataset) -> EvaluationReport {
        let batcher = WasteBatcher::new(dataset.image_size());
        let size = dataset.image_size();

        self.run_pass(dataset, |items| {
            let mut summed: Option<Tensor<B, 2>> = None;
            for view in TTA_VIEWS {
                let viewed: Vec<WasteItem> =
                    items.iter().map(|item| view.apply(item, size)).collect();
                let batch: WasteBatch<B> = batcher.batch(viewed, &self.device);
                let probs = self.model.forward_softmax(batch.images);
                summed = Some(match summed {
                    Some(acc) => acc + probs,
                    None => probs,
                });
            }

            let averaged = summed.expect("at least one TTA view") / TTA_VIEWS.len() as f32;
            argmax_labels(averaged)
        })
    }

    /// Write the per-class report and the prediction table, keyed by model
    /// name, under `results_dir`.
    pub fn export(
        &self,
        report: &EvaluationReport,
        results_dir: &Path,
        model_name: &str,
    ) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(results_dir)?;

        let report_path = results_dir.join(format!("{}_report.csv", model_name));
        std::fs::write(&report_path, self.render_report_csv(report))?;

        let preds_path = results_dir.join(format!("{}_preds.csv", model_name));
        std::fs::write(&preds_path, render_preds_csv(&report.records))?;

        info!(
            "wrote {:?} and {:?} ({} samples)",
            report_path,
            preds_path,
            report.records.len()
        );
        Ok((report_path, preds_path))
    }

    fn run_pass<F>(&self, dataset: &WasteTensorDataset, predict_batch: F) -> EvaluationReport
    where
        F: Fn(&[WasteItem]) -> Vec<usize>,
    {
        let mut records = Vec::with_capacity(dataset.len());
        let mut predictions = Vec::with_capacity(dataset.len());
        let mut truths = Vec::with_capacity(dataset.len());

        let len = dataset.len();
        for start in (0..len).step_by(self.batch_size) {
            let end = (start + self.batch_size).min(len);
            let items: Vec<WasteItem> = (start..end).filter_map(|i| dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }

            let predicted = predict_batch(&items);
            for (item, &label) in items.iter().zip(predicted.iter()) {
                records.push(EvaluationRecord {
                    path: item.path.clone(),
                    truth: item.label,
                    predicted: label,
                });
                truths.push(item.label);
            }
            predictions.extend(predicted);
        }

        let metrics =
            Metrics::from_predictions(&predictions, &truths, self.model.num_classes());

        EvaluationReport { metrics, records }
    }

    fn render_report_csv(&self, report: &EvaluationReport) -> String {
        let metrics = &report.metrics;
        let mut out = String::from("class,precision,recall,f1,support\n");

        for class in &metrics.per_class {
            let name = self
                .class_names
                .get(class.class_idx)
                .cloned()
                .unwrap_or_else(|| class.class_idx.to_string());
            out.push_str(&format!(
                "{},{:.6},{:.6},{:.6},{}\n",
                name, class.precision, class.recall, class.f1, class.support
            ));
        }

        let total = metrics.total_samples;
        out.push_str(&format!("accuracy,,,{:.6},{}\n", metrics.accuracy, total));
        out.push_str(&format!(
            "macro avg,{:.6},{:.6},{:.6},{}\n",
            metrics.macro_precision, metrics.macro_recall, metrics.macro_f1, total
        ));
        out.push_str(&format!(
            "weighted avg,,,{:.6},{}\n",
            metrics.weighted_f1, total
        ));

        out
    }
}

fn argmax_labels<B: Backend>(probs: Tensor<B, 2>) -> Vec<usize> {
    let [batch_size, _] = probs.dims();
    let predicted = probs.argmax(1).reshape([batch_size]);
    let predicted: Vec<i64> = predicted.into_data().to_vec().unwrap();
    predicted.into_iter().map(|p| p as usize).collect()
}

fn render_preds_csv(records: &[EvaluationRecord]) -> String {
    let mut out = String::from("path,gt,pred\n");
    for record in records {
        out.push_str(&format!(
            "{},{},{}\n",
            record.path, record.truth, record.predicted
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::model::ModelConfig;

    type TestBackend = NdArray;

    fn tiny_model(device: &<TestBackend as Backend>::Device) -> WasteNet<TestBackend> {
        let config = ModelConfig {
            num_classes: 3,
            block_counts: vec![1, 1, 1, 1],
            input_size: 32,
            ..Default::default()
        };
        WasteNet::new(&config, device).unwrap()
    }

    fn synthetic_dataset(size: usize) -> WasteTensorDataset {
        let truths = [0usize, 0, 1, 1, 2, 2];
        let items: Vec<WasteItem> = truths
            .iter()
            .enumerate()
            .map(|(i, &label)| {
                let value = 0.1 + 0.15 * (i as f32);
                WasteItem::from_data(vec![value; 3 * size * size], label, format!("s{}.jpg", i))
            })
            .collect();
        WasteTensorDataset::from_items(items, size)
    }

    #[test]
    fn test_plain_pass_covers_every_sample() {
        let device = Default::default();
        let model = tiny_model(&device);
        let dataset = synthetic_dataset(32);

        let evaluator = Evaluator::new(&model, device, 4, vec![]);
        let report = evaluator.evaluate(&dataset);

        assert_eq!(report.records.len(), 6);
        assert_eq!(report.metrics.total_samples, 6);
        assert_eq!(report.records[0].path, "s0.jpg");
        assert_eq!(report.records[5].truth, 2);
        for class in &report.metrics.per_class {
            assert_eq!(class.support, 2);
        }
    }

    #[test]
    fn test_tta_uses_identical_metric_machinery() {
        let device = Default::default();
        let model = tiny_model(&device);
        let dataset = synthetic_dataset(32);

        let evaluator = Evaluator::new(&model, device, 4, vec![]);
        let plain = evaluator.evaluate(&dataset);
        let tta = evaluator.evaluate_tta(&dataset);

        assert_eq!(plain.metrics.per_class.len(), tta.metrics.per_class.len());
        for (p, t) in plain
            .metrics
            .per_class
            .iter()
            .zip(tta.metrics.per_class.iter())
        {
            assert_eq!(p.support, t.support);
        }
        assert_eq!(plain.records.len(), tta.records.len());
        assert!((0.0..=1.0).contains(&tta.metrics.macro_f1));
    }

    #[test]
    fn test_export_writes_report_and_preds() {
        let device = Default::default();
        let model = tiny_model(&device);
        let dataset = synthetic_dataset(32);

        let class_names = vec!["cardboard".to_string(), "glass".to_string(), "metal".to_string()];
        let evaluator = Evaluator::new(&model, device, 4, class_names);
        let report = evaluator.evaluate(&dataset);

        let dir = std::env::temp_dir().join(format!("wastenet_eval_{}", std::process::id()));
        let (report_path, preds_path) = evaluator.export(&report, &dir, "tiny").unwrap();

        let report_csv = std::fs::read_to_string(&report_path).unwrap();
        assert!(report_csv.starts_with("class,precision,recall,f1,support\n"));
        assert!(report_csv.contains("cardboard,"));
        assert!(report_csv.contains("macro avg,"));

        let preds_csv = std::fs::read_to_string(&preds_path).unwrap();
        // Header plus one row per sample.
        assert_eq!(preds_csv.lines().count(), 7);
        assert!(preds_csv.starts_with("path,gt,pred\n"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

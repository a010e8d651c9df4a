//! Multi-stage training orchestrator.
//!
//! Training runs as a fixed three-stage schedule — a constant-rate stage, a
//! one-cycle stage, and a shorter one-cycle convergence check — with the
//! learning-rate finder re-probed against the current model at every stage
//! entry. After each epoch the validation macro-F1 is evaluated; a strict
//! improvement over the run's best overwrites the single best checkpoint,
//! and a run-wide stall counter (never reset at stage boundaries) terminates
//! the run early once the metric stops improving. The best checkpoint is
//! reloaded into the live model before returning, whichever stage produced
//! it.

use std::path::PathBuf;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamWConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::CompactRecorder;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::dataset::augmentation::Augmenter;
use crate::dataset::batcher::{WasteBatch, WasteBatcher, WasteItem, WasteTensorDataset};
use crate::model::WasteNet;
use crate::training::lr_finder::{find_lr, LrFinderConfig};
use crate::training::schedule::StageSchedule;
use crate::utils::error::{Result, WasteNetError};
use crate::utils::metrics::Metrics;

/// The orchestrator's state machine. Transitions run strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStage {
    /// Flat rate at the probed value
    Constant,
    /// One-cycle exploration
    Cyclical,
    /// Shorter one-cycle pass confirming no further improvement
    Convergence,
    /// Finished (normally or by early stop)
    Done,
}

impl TrainingStage {
    /// The three trainable stages, in execution order
    pub const SCHEDULE: [TrainingStage; 3] = [
        TrainingStage::Constant,
        TrainingStage::Cyclical,
        TrainingStage::Convergence,
    ];

    fn name(&self) -> &'static str {
        match self {
            TrainingStage::Constant => "constant",
            TrainingStage::Cyclical => "cyclical",
            TrainingStage::Convergence => "convergence",
            TrainingStage::Done => "done",
        }
    }
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Epochs per stage, in [`TrainingStage::SCHEDULE`] order
    pub stage_epochs: [usize; 3],

    /// Training batch size
    pub batch_size: usize,

    /// Early stopping fires once the stall counter exceeds this
    pub patience: usize,

    /// Minimum macro-F1 gain that counts as improvement for the stall counter
    pub min_delta: f64,

    /// Seed for epoch shuffling and train-time augmentation
    pub seed: u64,

    /// Random horizontal flips on training batches
    pub augment: bool,

    /// Number of leading training batches fed to the learning-rate finder
    pub probe_batches: usize,

    /// Sweep settings for the per-stage probe
    pub lr_finder: LrFinderConfig,

    /// Directory the best checkpoint is written to
    pub checkpoint_dir: PathBuf,

    /// Checkpoint and report file stem
    pub model_name: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stage_epochs: [24, 24, 12],
            batch_size: 64,
            patience: 4,
            min_delta: 0.001,
            seed: 42,
            augment: true,
            probe_batches: 8,
            lr_finder: LrFinderConfig::default(),
            checkpoint_dir: PathBuf::from("output/checkpoints"),
            model_name: "wastenet".to_string(),
        }
    }
}

/// Outcome of a completed (or early-stopped) run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Total epochs trained across all stages
    pub epochs_completed: usize,
    /// Best validation macro-F1 observed
    pub best_metric: f64,
    /// Epoch (0-indexed, run-wide) that produced the best metric
    pub best_epoch: usize,
    /// Whether the stall counter ended the run before the full schedule
    pub stopped_early: bool,
    /// Checkpoint file stem the best parameters were written to
    pub checkpoint_path: PathBuf,
}

/// Drives the three-stage schedule over a model
pub struct TrainingOrchestrator<B: AutodiffBackend> {
    model: WasteNet<B>,
    config: OrchestratorConfig,
    device: B::Device,
    stage: TrainingStage,
    best_metric: Option<f64>,
    best_epoch: usize,
    epochs_since_improvement: usize,
    epochs_completed: usize,
}

impl<B: AutodiffBackend> TrainingOrchestrator<B> {
    pub fn new(model: WasteNet<B>, config: OrchestratorConfig, device: B::Device) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(WasteNetError::Configuration(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if config.probe_batches == 0 {
            return Err(WasteNetError::Configuration(
                "probe_batches must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            model,
            config,
            device,
            stage: TrainingStage::Constant,
            best_metric: None,
            best_epoch: 0,
            epochs_since_improvement: 0,
            epochs_completed: 0,
        })
    }

    /// Current state-machine position
    pub fn stage(&self) -> TrainingStage {
        self.stage
    }

    /// The live model
    pub fn model(&self) -> &WasteNet<B> {
        &self.model
    }

    /// Consume the orchestrator, returning the model (best weights after a
    /// completed run)
    pub fn into_model(self) -> WasteNet<B> {
        self.model
    }

    /// Checkpoint file stem (the recorder appends its own extension)
    pub fn checkpoint_path(&self) -> PathBuf {
        self.config.checkpoint_dir.join(&self.config.model_name)
    }

    /// Execute the full schedule.
    pub fn run(
        &mut self,
        train: &WasteTensorDataset,
        valid: &WasteTensorDataset,
    ) -> Result<RunReport> {
        if train.len() == 0 {
            return Err(WasteNetError::Dataset(
                "training split is empty".to_string(),
            ));
        }

        std::fs::create_dir_all(&self.config.checkpoint_dir)?;

        let batcher = WasteBatcher::new(train.image_size());
        let mut shuffle_rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut augmenter = self
            .config
            .augment
            .then(|| Augmenter::new(train.image_size(), self.config.seed.wrapping_add(1)));

        let mut stopped_early = false;

        'stages: for (slot, &stage) in TrainingStage::SCHEDULE.iter().enumerate() {
            self.stage = stage;
            let epochs = self.config.stage_epochs[slot];
            if epochs == 0 {
                continue;
            }

            // Probe against the *current* model state, so later stages see
            // a rate fitted to the partially trained network.
            let probe_stream = self.assemble_probe_batches(train, &batcher);
            let probe = find_lr(&self.model, &probe_stream, &self.config.lr_finder)?;

            let schedule = match stage {
                TrainingStage::Constant => StageSchedule::constant(probe.suggestion),
                _ => StageSchedule::one_cycle(probe.suggestion, epochs),
            };
            info!(
                "stage '{}': {} epochs, {}",
                stage.name(),
                epochs,
                schedule.description()
            );

            // Fresh optimizer state per stage, as each stage is its own fit.
            let mut optimizer = AdamWConfig::new()
                .with_beta_1(0.9)
                .with_beta_2(0.99)
                .with_epsilon(1e-5)
                .with_weight_decay(0.01)
                .init();

            for epoch_in_stage in 0..epochs {
                let avg_loss = self.train_epoch(
                    train,
                    &batcher,
                    &mut optimizer,
                    &schedule,
                    epoch_in_stage,
                    &mut shuffle_rng,
                    augmenter.as_mut(),
                )?;

                let metrics = self.validate(valid, &batcher);
                info!(
                    "epoch {} ({} {}/{}): loss {:.4} | val {}",
                    self.epochs_completed + 1,
                    stage.name(),
                    epoch_in_stage + 1,
                    epochs,
                    avg_loss,
                    metrics.summary()
                );

                let stop = self.on_epoch_complete(metrics.macro_f1)?;
                self.epochs_completed += 1;

                if stop {
                    warn!(
                        "early stop: no improvement for more than {} epochs",
                        self.config.patience
                    );
                    stopped_early = true;
                    break 'stages;
                }
            }
        }

        self.stage = TrainingStage::Done;
        self.restore_best()?;

        let best_metric = self.best_metric.unwrap_or(0.0);
        info!(
            "run complete: {} epochs, best macro-F1 {:.4} at epoch {}",
            self.epochs_completed,
            best_metric,
            self.best_epoch + 1
        );

        Ok(RunReport {
            epochs_completed: self.epochs_completed,
            best_metric,
            best_epoch: self.best_epoch,
            stopped_early,
            checkpoint_path: self.checkpoint_path(),
        })
    }

    /// The first few training batches, in index order, for the finder.
    fn assemble_probe_batches(
        &self,
        train: &WasteTensorDataset,
        batcher: &WasteBatcher,
    ) -> Vec<WasteBatch<B>> {
        let limit = (self.config.probe_batches * self.config.batch_size).min(train.len());
        (0..limit)
            .collect::<Vec<_>>()
            .chunks(self.config.batch_size)
            .map(|chunk| {
                let items: Vec<WasteItem> =
                    chunk.iter().filter_map(|&i| train.get(i)).collect();
                batcher.batch(items, &self.device)
            })
            .collect()
    }

    /// One full pass over the training split in freshly shuffled order.
    #[allow(clippy::too_many_arguments)]
    fn train_epoch<O: Optimizer<WasteNet<B>, B>>(
        &mut self,
        train: &WasteTensorDataset,
        batcher: &WasteBatcher,
        optimizer: &mut O,
        schedule: &StageSchedule,
        epoch_in_stage: usize,
        rng: &mut ChaCha8Rng,
        mut augmenter: Option<&mut Augmenter>,
    ) -> Result<f64> {
        let mut indices: Vec<usize> = (0..train.len()).collect();
        indices.shuffle(rng);

        let steps_per_epoch = indices.len().div_ceil(self.config.batch_size);
        let mut epoch_loss = 0.0f64;

        for (step, chunk) in indices.chunks(self.config.batch_size).enumerate() {
            let mut items: Vec<WasteItem> =
                chunk.iter().filter_map(|&i| train.get(i)).collect();
            if let Some(augmenter) = augmenter.as_deref_mut() {
                items = items.into_iter().map(|item| augmenter.apply(item)).collect();
            }

            let batch = batcher.batch(items, &self.device);
            let lr = schedule.lr_at_step(epoch_in_stage, step, steps_per_epoch);

            let output = self.model.forward(batch.images.clone());
            let loss = CrossEntropyLossConfig::new()
                .init(&output.device())
                .forward(output, batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            if !loss_value.is_finite() {
                return Err(WasteNetError::Divergence {
                    epoch: self.epochs_completed,
                    batch: step,
                });
            }
            epoch_loss += loss_value;

            let grads = GradientsParams::from_grads(loss.backward(), &self.model);
            self.model = optimizer.step(lr, self.model.clone(), grads);

            debug!(
                "step {}/{}: lr {:.3e}, loss {:.4}",
                step + 1,
                steps_per_epoch,
                lr,
                loss_value
            );
        }

        Ok(epoch_loss / steps_per_epoch.max(1) as f64)
    }

    /// Macro-F1 (and friends) on the validation split, without autodiff.
    fn validate(&self, valid: &WasteTensorDataset, batcher: &WasteBatcher) -> Metrics {
        let model = self.model.valid();
        let device = <B::InnerBackend as Backend>::Device::default();

        let mut predictions = Vec::with_capacity(valid.len());
        let mut targets = Vec::with_capacity(valid.len());

        let len = valid.len();
        for start in (0..len).step_by(self.config.batch_size) {
            let end = (start + self.config.batch_size).min(len);
            let items: Vec<WasteItem> = (start..end).filter_map(|i| valid.get(i)).collect();
            if items.is_empty() {
                continue;
            }

            targets.extend(items.iter().map(|item| item.label));

            let batch: WasteBatch<B::InnerBackend> = batcher.batch(items, &device);
            let output = model.forward(batch.images);
            let [batch_size, _] = output.dims();
            let predicted = output.argmax(1).reshape([batch_size]);

            let predicted: Vec<i64> = predicted.into_data().to_vec().unwrap();
            predictions.extend(predicted.into_iter().map(|p| p as usize));
        }

        Metrics::from_predictions(&predictions, &targets, self.model.num_classes())
    }

    /// Synchronous epoch-complete transition: updates the best checkpoint
    /// and the stall counter, and reports whether the run should stop.
    fn on_epoch_complete(&mut self, macro_f1: f64) -> Result<bool> {
        let previous_best = self.best_metric;

        // The stall counter needs a margin; the checkpoint does not.
        let counts_as_improvement =
            previous_best.map_or(true, |best| macro_f1 > best + self.config.min_delta);
        if counts_as_improvement {
            self.epochs_since_improvement = 0;
        } else {
            self.epochs_since_improvement += 1;
        }

        if previous_best.map_or(true, |best| macro_f1 > best) {
            info!(
                "new best macro-F1: {:.4} (was {:.4})",
                macro_f1,
                previous_best.unwrap_or(0.0)
            );
            self.best_metric = Some(macro_f1);
            self.best_epoch = self.epochs_completed;
            self.save_checkpoint()?;
        }

        Ok(self.epochs_since_improvement > self.config.patience)
    }

    fn save_checkpoint(&self) -> Result<()> {
        let recorder = CompactRecorder::new();
        self.model
            .clone()
            .save_file(self.checkpoint_path(), &recorder)
            .map_err(|e| WasteNetError::Checkpoint(format!("failed to save snapshot: {:?}", e)))
    }

    /// Reload the best snapshot into the live model.
    fn restore_best(&mut self) -> Result<()> {
        if self.best_metric.is_none() {
            return Ok(());
        }

        self.model = self
            .model
            .clone()
            .load_file(self.checkpoint_path(), &CompactRecorder::new(), &self.device)
            .map_err(|e| {
                WasteNetError::Checkpoint(format!("failed to restore best snapshot: {:?}", e))
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    use crate::model::ModelConfig;

    type TestBackend = Autodiff<NdArray>;

    fn temp_checkpoint_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("wastenet_orch_{}_{}", tag, std::process::id()))
    }

    fn tiny_orchestrator(tag: &str, config: OrchestratorConfig) -> TrainingOrchestrator<TestBackend> {
        let device = Default::default();
        let model_config = ModelConfig {
            num_classes: 2,
            block_counts: vec![1, 1, 1, 1],
            input_size: 32,
            ..Default::default()
        };
        let model = WasteNet::new(&model_config, &device).unwrap();
        let config = OrchestratorConfig {
            checkpoint_dir: temp_checkpoint_dir(tag),
            ..config
        };
        TrainingOrchestrator::new(model, config, device).unwrap()
    }

    fn synthetic_dataset(samples: usize, size: usize) -> WasteTensorDataset {
        let items: Vec<WasteItem> = (0..samples)
            .map(|i| {
                let label = i % 2;
                // Class 0 images dark, class 1 images bright.
                let value = if label == 0 { 0.2 } else { 0.8 };
                WasteItem::from_data(
                    vec![value; 3 * size * size],
                    label,
                    format!("synthetic_{}.jpg", i),
                )
            })
            .collect();
        WasteTensorDataset::from_items(items, size)
    }

    #[test]
    fn test_best_metric_is_monotone_and_checkpointed() {
        let mut orch = tiny_orchestrator(
            "monotone",
            OrchestratorConfig {
                patience: 4,
                min_delta: 0.0,
                ..Default::default()
            },
        );
        std::fs::create_dir_all(&orch.config.checkpoint_dir).unwrap();

        let sequence = [0.4, 0.6, 0.5, 0.65, 0.6];
        let mut best_seen = 0.0;
        for f1 in sequence {
            orch.on_epoch_complete(f1).unwrap();
            orch.epochs_completed += 1;
            let best = orch.best_metric.unwrap();
            assert!(best >= best_seen, "best must never regress");
            best_seen = best;
        }
        assert!((best_seen - 0.65).abs() < 1e-12);
        assert_eq!(orch.best_epoch, 3);

        std::fs::remove_dir_all(&orch.config.checkpoint_dir).unwrap();
    }

    #[test]
    fn test_early_stop_fires_only_after_patience_exceeded() {
        let mut orch = tiny_orchestrator(
            "patience",
            OrchestratorConfig {
                patience: 4,
                min_delta: 0.0,
                ..Default::default()
            },
        );
        std::fs::create_dir_all(&orch.config.checkpoint_dir).unwrap();

        // First epoch improves (from nothing), then the metric is flat.
        assert!(!orch.on_epoch_complete(0.5).unwrap());
        orch.epochs_completed += 1;

        for stall in 1..=4 {
            let stop = orch.on_epoch_complete(0.5).unwrap();
            orch.epochs_completed += 1;
            assert!(!stop, "must not stop at stall count {}", stall);
        }

        // Fifth flat epoch exceeds patience 4.
        assert!(orch.on_epoch_complete(0.5).unwrap());

        std::fs::remove_dir_all(&orch.config.checkpoint_dir).unwrap();
    }

    #[test]
    fn test_stall_counter_survives_small_gains_below_min_delta() {
        let mut orch = tiny_orchestrator(
            "min_delta",
            OrchestratorConfig {
                patience: 2,
                min_delta: 0.01,
                ..Default::default()
            },
        );
        std::fs::create_dir_all(&orch.config.checkpoint_dir).unwrap();

        assert!(!orch.on_epoch_complete(0.500).unwrap());
        // Gains below min_delta still move the checkpointed best,
        // but do not reset the stall counter.
        assert!(!orch.on_epoch_complete(0.505).unwrap());
        assert!(!orch.on_epoch_complete(0.506).unwrap());
        assert!(orch.on_epoch_complete(0.507).unwrap());
        assert!((orch.best_metric.unwrap() - 0.507).abs() < 1e-12);

        std::fs::remove_dir_all(&orch.config.checkpoint_dir).unwrap();
    }

    #[test]
    fn test_single_constant_epoch_end_to_end() {
        let size = 32;
        let train = synthetic_dataset(4, size);
        let valid = synthetic_dataset(4, size);

        let mut orch = tiny_orchestrator(
            "e2e",
            OrchestratorConfig {
                stage_epochs: [1, 0, 0],
                batch_size: 2,
                probe_batches: 2,
                augment: false,
                lr_finder: LrFinderConfig {
                    start_lr: 1e-5,
                    end_lr: 1e-2,
                    num_steps: 4,
                    ..Default::default()
                },
                ..Default::default()
            },
        );

        let report = orch.run(&train, &valid).unwrap();

        assert_eq!(report.epochs_completed, 1);
        assert!(!report.stopped_early);
        assert!(report.best_metric.is_finite());
        assert!((0.0..=1.0).contains(&report.best_metric));
        assert_eq!(orch.stage(), TrainingStage::Done);
        assert!(
            report.checkpoint_path.with_extension("mpk").exists(),
            "exactly one best checkpoint must exist"
        );

        std::fs::remove_dir_all(&orch.config.checkpoint_dir).unwrap();
    }
}

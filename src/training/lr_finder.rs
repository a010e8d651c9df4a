//! Learning-rate finder.
//!
//! Sweeps a learning rate exponentially across a range while taking real
//! optimization steps against a small probe batch stream, records the
//! smoothed loss trajectory, and proposes the rate at the steepest loss
//! descent scaled down by a safety factor.
//!
//! The sweep runs against a clone of the model with a throwaway optimizer,
//! so the caller's parameters are untouched by construction. Rerunning the
//! probe on the same model state and batches yields the same suggestion.

use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamWConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use tracing::debug;

use crate::dataset::batcher::WasteBatch;
use crate::model::WasteNet;
use crate::utils::error::{Result, WasteNetError};

/// Sweep parameters
#[derive(Debug, Clone)]
pub struct LrFinderConfig {
    /// First swept rate
    pub start_lr: f64,
    /// Last swept rate
    pub end_lr: f64,
    /// Number of probe iterations across the range
    pub num_steps: usize,
    /// Exponential smoothing coefficient for the loss trajectory
    pub smoothing: f64,
    /// Stop the sweep once the smoothed loss exceeds this multiple of the
    /// best smoothed loss seen
    pub divergence_factor: f64,
    /// The steepest-descent rate is divided by this before being returned
    pub safety_factor: f64,
}

impl Default for LrFinderConfig {
    fn default() -> Self {
        Self {
            start_lr: 1e-7,
            end_lr: 10.0,
            num_steps: 100,
            smoothing: 0.98,
            divergence_factor: 4.0,
            safety_factor: 2.0,
        }
    }
}

/// Outcome of a sweep: the recorded curve and the proposed rate.
///
/// The curve is kept so callers can plot loss against rate; plotting itself
/// is out of scope here.
#[derive(Debug, Clone)]
pub struct LrProbe {
    /// Swept rates, in sweep order
    pub rates: Vec<f64>,
    /// Smoothed losses, parallel to `rates`
    pub losses: Vec<f64>,
    /// Recommended starting rate
    pub suggestion: f64,
}

/// Run the sweep against `model` without altering it.
pub fn find_lr<B: AutodiffBackend>(
    model: &WasteNet<B>,
    batches: &[WasteBatch<B>],
    config: &LrFinderConfig,
) -> Result<LrProbe> {
    let probe_failure = |reason: &str| WasteNetError::ProbeFailure {
        start_lr: config.start_lr,
        end_lr: config.end_lr,
        reason: reason.to_string(),
    };

    if batches.is_empty() {
        return Err(probe_failure("probe batch stream is empty"));
    }
    if config.num_steps < 2 {
        return Err(probe_failure("sweep needs at least two steps"));
    }

    // All updates land on this clone and die with it.
    let mut probe_model = model.clone();
    let mut optimizer = AdamWConfig::new().init();

    let ratio = config.end_lr / config.start_lr;
    let denom = (config.num_steps - 1) as f64;

    let mut rates = Vec::with_capacity(config.num_steps);
    let mut losses = Vec::with_capacity(config.num_steps);
    let mut running = 0.0f64;
    let mut best_loss = f64::INFINITY;

    for step in 0..config.num_steps {
        let lr = config.start_lr * ratio.powf(step as f64 / denom);
        let batch = &batches[step % batches.len()];

        let output = probe_model.forward(batch.images.clone());
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output, batch.targets.clone());

        let raw: f64 = loss.clone().into_scalar().elem();
        if !raw.is_finite() {
            debug!("probe stopped at step {}: non-finite loss", step);
            break;
        }

        // Bias-corrected exponential smoothing.
        running = config.smoothing * running + (1.0 - config.smoothing) * raw;
        let smoothed = running / (1.0 - config.smoothing.powi(step as i32 + 1));

        rates.push(lr);
        losses.push(smoothed);

        if smoothed < best_loss {
            best_loss = smoothed;
        } else if smoothed > config.divergence_factor * best_loss {
            debug!("probe stopped at step {}: smoothed loss diverged", step);
            break;
        }

        let grads = GradientsParams::from_grads(loss.backward(), &probe_model);
        probe_model = optimizer.step(lr, probe_model, grads);
    }

    if rates.len() < 2 {
        return Err(probe_failure(
            "loss was non-finite across the swept range",
        ));
    }

    // Steepest descent of the smoothed curve (global minimum slope).
    let mut steepest_idx = 0;
    let mut steepest_slope = f64::INFINITY;
    for i in 0..losses.len() - 1 {
        let slope = losses[i + 1] - losses[i];
        if slope < steepest_slope {
            steepest_slope = slope;
            steepest_idx = i;
        }
    }

    let suggestion = rates[steepest_idx] / config.safety_factor;
    debug!(
        "probe recorded {} points, suggesting lr {:.3e}",
        rates.len(),
        suggestion
    );

    Ok(LrProbe {
        rates,
        losses,
        suggestion,
    })
}

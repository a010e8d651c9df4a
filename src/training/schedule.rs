//! Per-stage learning-rate schedules.
//!
//! Each training stage runs under one of two shapes: a flat rate, or the
//! one-cycle policy (linear warmup to the peak rate, cosine anneal down).
//! One-cycle rates are computed per step so the cycle spans the stage's full
//! batch count rather than jumping once per epoch.

use serde::{Deserialize, Serialize};

/// Learning-rate schedule for a single training stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageSchedule {
    /// Constant learning rate
    Constant { lr: f64 },

    /// One-cycle policy: rise to `max_lr`, then anneal below the start
    OneCycle {
        max_lr: f64,
        total_epochs: usize,
        pct_start: f64,
        div_factor: f64,
        final_div_factor: f64,
    },
}

impl StageSchedule {
    /// Flat schedule at `lr`
    pub fn constant(lr: f64) -> Self {
        Self::Constant { lr }
    }

    /// One-cycle schedule with the conventional shape parameters
    pub fn one_cycle(max_lr: f64, total_epochs: usize) -> Self {
        Self::OneCycle {
            max_lr,
            total_epochs,
            pct_start: 0.3,
            div_factor: 25.0,
            final_div_factor: 1e4,
        }
    }

    /// Learning rate at a given step within a given epoch of the stage
    pub fn lr_at_step(&self, epoch: usize, step: usize, steps_per_epoch: usize) -> f64 {
        match self {
            Self::Constant { lr } => *lr,

            Self::OneCycle {
                max_lr,
                total_epochs,
                pct_start,
                div_factor,
                final_div_factor,
            } => {
                let initial_lr = max_lr / div_factor;
                let min_lr = max_lr / final_div_factor;
                let total_steps = (*total_epochs as f64) * (steps_per_epoch as f64);
                let warmup_steps = (total_steps * pct_start).max(1.0);
                let current_step = (epoch * steps_per_epoch + step) as f64;

                if current_step < warmup_steps {
                    let progress = current_step / warmup_steps;
                    initial_lr + (max_lr - initial_lr) * progress
                } else {
                    let remaining_steps = (total_steps - warmup_steps).max(1.0);
                    let progress = (current_step - warmup_steps) / remaining_steps;
                    let cosine_factor = (1.0 + (std::f64::consts::PI * progress).cos()) / 2.0;
                    min_lr + (max_lr - min_lr) * cosine_factor
                }
            }
        }
    }

    /// Short description for logging
    pub fn description(&self) -> String {
        match self {
            Self::Constant { lr } => format!("constant lr={:.2e}", lr),
            Self::OneCycle {
                max_lr,
                total_epochs,
                ..
            } => format!("one-cycle max_lr={:.2e} over {} epochs", max_lr, total_epochs),
        }
    }
}

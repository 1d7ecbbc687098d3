//! Learning rate schedulers

use super::Optimizer;

/// Learning rate scheduler trait
pub trait LRScheduler {
    /// Get the current learning rate
    fn get_lr(&self) -> f32;

    /// Step the scheduler (called once per iteration)
    fn step(&mut self);
}

/// One-shot step decay
///
/// Returns `initial_lr` for the first `decay_at` steps and `decayed_lr`
/// from then on.
#[derive(Debug, Clone)]
pub struct StepDecayLR {
    initial_lr: f32,
    decayed_lr: f32,
    decay_at: usize,
    current_step: usize,
}

impl StepDecayLR {
    pub fn new(initial_lr: f32, decayed_lr: f32, decay_at: usize) -> Self {
        Self {
            initial_lr,
            decayed_lr,
            decay_at,
            current_step: 0,
        }
    }

    /// Steps taken so far
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Apply the current learning rate to an optimizer
    pub fn apply<O: Optimizer + ?Sized>(&self, optimizer: &mut O) {
        optimizer.set_lr(self.get_lr());
    }
}

impl LRScheduler for StepDecayLR {
    fn get_lr(&self) -> f32 {
        if self.current_step >= self.decay_at {
            self.decayed_lr
        } else {
            self.initial_lr
        }
    }

    fn step(&mut self) {
        self.current_step += 1;
    }
}

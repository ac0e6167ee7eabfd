//! Epoch-end training controls: early stopping, learning-rate reduction on a
//! plateau and best-checkpoint tracking.

/// Stops training once the monitored loss has not improved for `patience`
/// consecutive epochs.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best: f64,
    best_epoch: Option<usize>,
    wait: usize,
}

/// Result of feeding one epoch's loss to [`EarlyStopping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopDecision {
    /// The epoch set a new best; its weights should be kept.
    pub improved: bool,
    pub stop: bool,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f64::INFINITY,
            best_epoch: None,
            wait: 0,
        }
    }

    pub fn update(&mut self, epoch: usize, loss: f64) -> StopDecision {
        if loss < self.best {
            self.best = loss;
            self.best_epoch = Some(epoch);
            self.wait = 0;
            return StopDecision {
                improved: true,
                stop: false,
            };
        }
        self.wait += 1;
        StopDecision {
            improved: false,
            stop: self.wait >= self.patience,
        }
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}

/// Multiplies the learning rate by `factor` after `patience` epochs without
/// an improvement larger than `min_delta`, never going below `min_lr`.
#[derive(Debug, Clone)]
pub struct PlateauScheduler {
    factor: f64,
    patience: usize,
    min_lr: f64,
    min_delta: f64,
    best: f64,
    wait: usize,
}

impl PlateauScheduler {
    pub fn new(factor: f64, patience: usize, min_lr: f64, min_delta: f64) -> Self {
        Self {
            factor,
            patience,
            min_lr,
            min_delta,
            best: f64::INFINITY,
            wait: 0,
        }
    }

    /// Returns the new learning rate when a reduction is due.
    pub fn step(&mut self, loss: f64, lr: f64) -> Option<f64> {
        if loss < self.best - self.min_delta {
            self.best = loss;
            self.wait = 0;
            return None;
        }
        self.wait += 1;
        if self.wait < self.patience {
            return None;
        }
        self.wait = 0;
        if lr > self.min_lr {
            Some((lr * self.factor).max(self.min_lr))
        } else {
            None
        }
    }
}

/// Tracks the highest monitored accuracy seen so far.
#[derive(Debug, Clone, Default)]
pub struct BestTracker {
    best: Option<f64>,
}

impl BestTracker {
    /// True when `value` beats every earlier value.
    pub fn update(&mut self, value: f64) -> bool {
        match self.best {
            Some(best) if value <= best => false,
            _ => {
                self.best = Some(value);
                true
            }
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }
}

use std::path::PathBuf;

/// Frozen-at-startup configuration for one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// Length of the bitstring.
    pub n_elems: usize,
    pub n_train_samples: usize,
    pub n_eval_samples: usize,
    pub n_epochs: usize,
    /// Base probability of flipping a training label away from true parity.
    pub base_noisy_label: f64,
    pub n_layers: usize,
    /// When false the training dataset always keeps its true labels.
    pub noise: bool,
    pub seed: u64,
    /// Multiplier on the 0.001 base Adam learning rate.
    pub lr: f64,
    pub result_dir: PathBuf,
}

/// Shared runtime settings for a noise-rate sweep; the base noise rate
/// itself is supplied per sweep point.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub n_elems: usize,
    pub n_train_samples: usize,
    pub n_eval_samples: usize,
    pub n_epochs: usize,
    pub n_layers: usize,
    pub seed: u64,
    pub lr: f64,
    pub result_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Train(TrainConfig),
    Sweep(SweepConfig),
}

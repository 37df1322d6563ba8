use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::TrainConfig;
use crate::data::{DataError, ParityDataset};
use crate::eval::{batch_accuracy, dataset_accuracy};
use crate::model::{sigmoid, LstmParity};
use crate::optimizer::{Adam, AdamConfig};

pub const BATCH_SIZE: usize = 128;
pub const EVAL_INTERVAL: usize = 100;
pub const BASE_LEARNING_RATE: f64 = 0.001;
pub const SUCCESS_THRESHOLD: f64 = 0.95;

// Independent rng streams derived from the one configured seed.
const DATA_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;
const SHUFFLE_STREAM: u64 = 0xA36C_D6F2_15B3_9241;
const MODEL_STREAM: u64 = 0xE61A_4BF0_2D89_7C53;
const NOISE_STREAM: u64 = 0x6C62_272E_07BB_0142;
const EPOCH_STRIDE: u64 = 0x100_0000_01B3;

/// Mutable bookkeeping threaded through the epoch loop: the rolling
/// validation-accuracy list feeding the next epoch's noise rate, the best
/// training-batch accuracy seen at any checkpoint, and the global step.
#[derive(Debug, Clone, Default)]
pub struct CurriculumState {
    val_accuracies: Vec<f64>,
    pub train_max_acc: f64,
    pub global_step: usize,
}

impl CurriculumState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mean of the accuracies recorded during the previous epoch, or the
    /// uninformative 0.5 prior when none were recorded; clears the list for
    /// the epoch about to start.
    pub fn epoch_average_and_reset(&mut self) -> f64 {
        let average = if self.val_accuracies.is_empty() {
            0.5
        } else {
            self.val_accuracies.iter().sum::<f64>() / (self.val_accuracies.len() as f64)
        };
        self.val_accuracies.clear();
        average
    }

    pub fn record_val_accuracy(&mut self, val_acc: f64) {
        self.val_accuracies.push(val_acc);
    }

    pub fn observe_train_accuracy(&mut self, train_acc: f64) {
        if train_acc > self.train_max_acc {
            self.train_max_acc = train_acc;
        }
    }
}

/// Label-noise rate for the coming epoch. Above 50% validation accuracy the
/// rate falls off linearly, hitting zero at perfect accuracy; at or below
/// 50% the model has shown nothing yet and the full base rate applies.
pub fn noise_rate_for(avg_val_acc: f64, base_noisy_label: f64) -> f64 {
    if avg_val_acc > 0.5 {
        base_noisy_label * (2.0 - 2.0 * avg_val_acc)
    } else {
        base_noisy_label
    }
}

/// Terminal status of a run: the success condition fired, or the epoch
/// budget ran out without it (a normal outcome, not an error).
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Converged {
        val_acc: f64,
        train_max_acc: f64,
        steps: usize,
    },
    Exhausted {
        epochs: usize,
        train_max_acc: f64,
        steps: usize,
    },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged {
                val_acc,
                train_max_acc,
                steps,
            } => write!(
                f,
                "outcome=converged val_acc={val_acc:.4} train_max_acc={train_max_acc:.4} steps={steps}"
            ),
            Self::Exhausted {
                epochs,
                train_max_acc,
                steps,
            } => write!(
                f,
                "outcome=exhausted epochs={epochs} train_max_acc={train_max_acc:.4} steps={steps}"
            ),
        }
    }
}

#[derive(Debug)]
pub enum TrainError {
    Io(std::io::Error),
    Data(DataError),
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Data(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for TrainError {}

impl From<std::io::Error> for TrainError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<DataError> for TrainError {
    fn from(err: DataError) -> Self {
        Self::Data(err)
    }
}

/// Run the adaptive-noise curriculum until the success condition fires or
/// the epoch budget is exhausted.
pub fn run(config: &TrainConfig) -> Result<Outcome, TrainError> {
    let mut data_rng = StdRng::seed_from_u64(config.seed ^ DATA_STREAM);
    let mut train_data = ParityDataset::new(
        config.n_train_samples,
        config.n_elems,
        config.noise,
        &mut data_rng,
    )?;
    let eval_data = ParityDataset::new(
        config.n_eval_samples,
        config.n_elems,
        config.noise,
        &mut data_rng,
    )?;

    let mut model = LstmParity::new(config.n_layers, config.seed ^ MODEL_STREAM);
    let mut optimizer = Adam::new(AdamConfig::default());
    let mut shuffle_rng = StdRng::seed_from_u64(config.seed ^ SHUFFLE_STREAM);
    let learning_rate = BASE_LEARNING_RATE * config.lr;
    let mut state = CurriculumState::new();

    for epoch in 0..config.n_epochs {
        println!("Epochs: {epoch}");

        let avg_val_acc = state.epoch_average_and_reset();
        let rate = noise_rate_for(avg_val_acc, config.base_noisy_label);
        // One rng stream per epoch keeps each epoch's labels reproducible.
        let mut noise_rng = StdRng::seed_from_u64(
            config.seed ^ NOISE_STREAM ^ (epoch as u64).wrapping_mul(EPOCH_STRIDE),
        );
        train_data.set_noise_rate(rate, &mut noise_rng);

        for batch in train_data.shuffled_batches(BATCH_SIZE, &mut shuffle_rng) {
            let labels: Vec<f64> = batch.iter().map(|idx| train_data.label(*idx)).collect();
            let scale = 1.0 / (batch.len() as f64);

            model.zero_grad();
            let mut logits = Vec::with_capacity(batch.len());
            for (idx, label) in batch.iter().zip(&labels) {
                let (logit, cache) = model.forward_cached(train_data.bits(*idx));
                model.backward(&cache, (sigmoid(logit) - label) * scale);
                logits.push(logit);
            }
            optimizer.step(&mut model.tensors_mut(), learning_rate);

            // Step 0 included; the train accuracy scores the pre-update
            // logits of the batch that was just stepped on.
            if state.global_step.is_multiple_of(EVAL_INTERVAL) {
                state.observe_train_accuracy(batch_accuracy(&logits, &labels));
                let val_acc = dataset_accuracy(&model, &eval_data, BATCH_SIZE);
                state.record_val_accuracy(val_acc);
                println!("{val_acc}");

                if val_acc > SUCCESS_THRESHOLD {
                    append_result_line(
                        &result_file_path(config),
                        val_acc,
                        state.train_max_acc,
                        state.global_step,
                    )?;
                    return Ok(Outcome::Converged {
                        val_acc,
                        train_max_acc: state.train_max_acc,
                        steps: state.global_step,
                    });
                }
            }
            state.global_step += 1;
        }
    }

    Ok(Outcome::Exhausted {
        epochs: config.n_epochs,
        train_max_acc: state.train_max_acc,
        steps: state.global_step,
    })
}

/// `<result_dir>/n=<n_elems>_<base_noisy_label>.txt`
pub fn result_file_path(config: &TrainConfig) -> PathBuf {
    config
        .result_dir
        .join(format!("n={}_{}.txt", config.n_elems, config.base_noisy_label))
}

fn append_result_line(
    path: &Path,
    val_acc: f64,
    train_max_acc: f64,
    steps: usize,
) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "Test: {val_acc}, Train: {train_max_acc}, Steps: {steps}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::config::TrainConfig;

    use super::{noise_rate_for, result_file_path, run, CurriculumState, Outcome, TrainError};

    fn assert_close(lhs: f64, rhs: f64) {
        assert!(
            (lhs - rhs).abs() <= 1e-12,
            "values differ: left={lhs}, right={rhs}"
        );
    }

    fn small_config() -> TrainConfig {
        TrainConfig {
            n_elems: 3,
            n_train_samples: 256,
            n_eval_samples: 64,
            n_epochs: 1,
            base_noisy_label: 0.3,
            n_layers: 1,
            noise: true,
            seed: 0,
            lr: 0.3,
            result_dir: PathBuf::from("results/test_artifacts"),
        }
    }

    #[test]
    fn noise_rate_falls_linearly_above_chance() {
        assert_close(noise_rate_for(1.0, 0.3), 0.0);
        assert_close(noise_rate_for(0.75, 0.3), 0.15);
        assert_close(noise_rate_for(0.6, 0.2), 0.2 * 0.8);
    }

    #[test]
    fn noise_rate_stays_at_base_at_or_below_chance() {
        assert_close(noise_rate_for(0.5, 0.3), 0.3);
        assert_close(noise_rate_for(0.4, 0.3), 0.3);
        assert_close(noise_rate_for(0.0, 0.3), 0.3);
    }

    #[test]
    fn first_epoch_average_is_uninformative_prior() {
        let mut state = CurriculumState::new();
        assert_close(state.epoch_average_and_reset(), 0.5);
    }

    #[test]
    fn epoch_average_consumes_recorded_accuracies() {
        let mut state = CurriculumState::new();
        state.record_val_accuracy(0.6);
        state.record_val_accuracy(0.8);
        assert_close(state.epoch_average_and_reset(), 0.7);
        // List cleared: the next epoch falls back to the prior.
        assert_close(state.epoch_average_and_reset(), 0.5);
    }

    #[test]
    fn train_max_accuracy_is_monotonic() {
        let mut state = CurriculumState::new();
        state.observe_train_accuracy(0.6);
        state.observe_train_accuracy(0.4);
        state.observe_train_accuracy(0.9);
        assert_close(state.train_max_acc, 0.9);
    }

    #[test]
    fn zero_epoch_budget_exhausts_without_stepping() {
        let config = TrainConfig {
            n_epochs: 0,
            ..small_config()
        };
        let outcome = run(&config).expect("run completes");
        assert_eq!(
            outcome,
            Outcome::Exhausted {
                epochs: 0,
                train_max_acc: 0.0,
                steps: 0,
            }
        );
    }

    #[test]
    fn degenerate_dataset_shapes_fail_fast() {
        let config = TrainConfig {
            n_train_samples: 0,
            ..small_config()
        };
        let err = run(&config).expect_err("zero samples must be rejected");
        assert!(matches!(err, TrainError::Data(_)));

        let config = TrainConfig {
            n_elems: 0,
            ..small_config()
        };
        let err = run(&config).expect_err("zero-length sequences must be rejected");
        assert!(matches!(err, TrainError::Data(_)));
    }

    #[test]
    fn single_epoch_run_counts_every_batch() {
        let config = small_config();
        let outcome = run(&config).expect("run completes");
        match outcome {
            // 256 samples in batches of 128.
            Outcome::Exhausted { epochs, steps, .. } => {
                assert_eq!(epochs, 1);
                assert_eq!(steps, 2);
            }
            Outcome::Converged { steps, .. } => assert!(steps < 2),
        }
    }

    #[test]
    fn result_path_encodes_length_and_base_rate() {
        let config = small_config();
        assert_eq!(
            result_file_path(&config),
            PathBuf::from("results/test_artifacts/n=3_0.3.txt")
        );
    }

    #[test]
    fn outcome_display_names_the_terminal_status() {
        let converged = Outcome::Converged {
            val_acc: 0.96,
            train_max_acc: 0.9921875,
            steps: 300,
        };
        assert_eq!(
            converged.to_string(),
            "outcome=converged val_acc=0.9600 train_max_acc=0.9922 steps=300"
        );

        let exhausted = Outcome::Exhausted {
            epochs: 5,
            train_max_acc: 0.75,
            steps: 1000,
        };
        assert_eq!(
            exhausted.to_string(),
            "outcome=exhausted epochs=5 train_max_acc=0.7500 steps=1000"
        );
    }
}

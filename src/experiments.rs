use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{SweepConfig, TrainConfig};
use crate::training::{self, Outcome};

/// Base noise rates exercised by the sweep command.
pub const SWEEP_RATES: [f64; 5] = [0.0, 0.1, 0.2, 0.3, 0.4];

#[derive(Debug, Clone)]
struct SweepRecord {
    base_noisy_label: f64,
    converged: bool,
    val_acc: Option<f64>,
    train_max_acc: f64,
    steps: usize,
    seed: u64,
}

impl SweepRecord {
    fn from_outcome(base_noisy_label: f64, outcome: &Outcome, seed: u64) -> Self {
        match *outcome {
            Outcome::Converged {
                val_acc,
                train_max_acc,
                steps,
            } => Self {
                base_noisy_label,
                converged: true,
                val_acc: Some(val_acc),
                train_max_acc,
                steps,
                seed,
            },
            Outcome::Exhausted {
                train_max_acc,
                steps,
                ..
            } => Self {
                base_noisy_label,
                converged: false,
                val_acc: None,
                train_max_acc,
                steps,
                seed,
            },
        }
    }

    fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{:.6},{},{}",
            self.base_noisy_label,
            self.converged,
            self.val_acc
                .map(|acc| format!("{acc:.6}"))
                .unwrap_or_else(|| "none".to_string()),
            self.train_max_acc,
            self.steps,
            self.seed
        )
    }

    fn to_json_line(&self) -> String {
        format!(
            "{{\"base_noisy_label\":{},\"converged\":{},\"val_acc\":{},\"train_max_acc\":{:.6},\"steps\":{},\"seed\":{}}}",
            self.base_noisy_label,
            self.converged,
            self.val_acc
                .map(|acc| format!("{acc:.6}"))
                .unwrap_or_else(|| "null".to_string()),
            self.train_max_acc,
            self.steps,
            self.seed
        )
    }
}

#[derive(Debug)]
pub struct SweepReport {
    records: Vec<SweepRecord>,
    csv_path: PathBuf,
    jsonl_path: PathBuf,
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "sweep rates={} csv={} jsonl={}",
            self.records.len(),
            self.csv_path.display(),
            self.jsonl_path.display()
        )?;
        writeln!(f, "base_noisy_label,converged,val_acc,train_max_acc,steps")?;
        for record in &self.records {
            writeln!(
                f,
                "{},{},{},{:.4},{}",
                record.base_noisy_label,
                record.converged,
                record
                    .val_acc
                    .map(|acc| format!("{acc:.4}"))
                    .unwrap_or_else(|| "none".to_string()),
                record.train_max_acc,
                record.steps
            )?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum SweepError {
    Io(std::io::Error),
    Train(training::TrainError),
}

impl fmt::Display for SweepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Train(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SweepError {}

impl From<std::io::Error> for SweepError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<training::TrainError> for SweepError {
    fn from(err: training::TrainError) -> Self {
        Self::Train(err)
    }
}

/// Run the training loop once per base noise rate and record each outcome.
pub fn run_sweep(config: &SweepConfig) -> Result<SweepReport, SweepError> {
    let mut records = Vec::with_capacity(SWEEP_RATES.len());
    for rate in SWEEP_RATES {
        let train_config = TrainConfig {
            n_elems: config.n_elems,
            n_train_samples: config.n_train_samples,
            n_eval_samples: config.n_eval_samples,
            n_epochs: config.n_epochs,
            base_noisy_label: rate,
            n_layers: config.n_layers,
            noise: true,
            seed: config.seed,
            lr: config.lr,
            result_dir: config.result_dir.clone(),
        };
        let outcome = training::run(&train_config)?;
        records.push(SweepRecord::from_outcome(rate, &outcome, config.seed));
    }

    let (csv_path, jsonl_path) = make_artifact_paths(config);
    write_csv(&csv_path, &records)?;
    write_jsonl(&jsonl_path, &records)?;

    Ok(SweepReport {
        records,
        csv_path,
        jsonl_path,
    })
}

fn make_artifact_paths(config: &SweepConfig) -> (PathBuf, PathBuf) {
    let run_id = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let stem = format!(
        "sweep_n-{}_seed-{}_epochs-{}_{}",
        config.n_elems, config.seed, config.n_epochs, run_id
    );
    (
        config.result_dir.join(format!("{stem}.csv")),
        config.result_dir.join(format!("{stem}.jsonl")),
    )
}

fn write_csv(path: &PathBuf, records: &[SweepRecord]) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    writeln!(
        file,
        "base_noisy_label,converged,val_acc,train_max_acc,steps,seed"
    )?;
    for record in records {
        writeln!(file, "{}", record.to_csv_row())?;
    }
    Ok(())
}

fn write_jsonl(path: &PathBuf, records: &[SweepRecord]) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    for record in records {
        writeln!(file, "{}", record.to_json_line())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use crate::config::SweepConfig;

    use super::{run_sweep, SWEEP_RATES};

    #[test]
    fn sweep_covers_every_rate_and_writes_artifacts() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let result_dir = PathBuf::from(format!("results/test_artifacts/sweep_{unique}"));

        let config = SweepConfig {
            n_elems: 2,
            n_train_samples: 256,
            n_eval_samples: 64,
            n_epochs: 1,
            n_layers: 1,
            seed: 5,
            lr: 0.3,
            result_dir: result_dir.clone(),
        };
        let report = run_sweep(&config).expect("sweep report");

        assert_eq!(report.records.len(), SWEEP_RATES.len());
        for (record, rate) in report.records.iter().zip(SWEEP_RATES) {
            assert_eq!(record.base_noisy_label, rate);
            assert_eq!(record.converged, record.val_acc.is_some());
        }

        assert!(report.csv_path.exists());
        assert!(report.jsonl_path.exists());

        let csv = fs::read_to_string(&report.csv_path).expect("read csv");
        let jsonl = fs::read_to_string(&report.jsonl_path).expect("read jsonl");
        assert_eq!(csv.lines().count(), SWEEP_RATES.len() + 1);
        assert_eq!(jsonl.lines().count(), SWEEP_RATES.len());
        assert!(csv.starts_with("base_noisy_label,"));
        assert!(jsonl.contains("\"base_noisy_label\":0"));

        let _ = fs::remove_dir_all(&result_dir);
    }
}

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{AppCommand, SweepConfig, TrainConfig};

#[derive(Debug, Parser)]
#[command(
    name = "parity-curriculum",
    version,
    about = "Adaptive label-noise parity training CLI"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Train one configuration until convergence or epoch exhaustion.
    Train(TrainArgs),
    /// Train once per base noise rate and record the outcomes.
    Sweep(SweepArgs),
}

#[derive(Debug, Args)]
struct TrainArgs {
    /// Length of the bitstring.
    #[arg(long, default_value_t = 20)]
    n_elems: usize,
    #[arg(long, default_value_t = 25600)]
    n_train_samples: usize,
    #[arg(long, default_value_t = 1000)]
    n_eval_samples: usize,
    #[arg(long, default_value_t = 1000)]
    n_epochs: usize,
    /// Base label-flip probability fed to the curriculum.
    #[arg(long, default_value_t = 0.3)]
    noisy_label: f64,
    #[arg(long, default_value_t = 1)]
    n_layers: usize,
    /// Whether training labels may be corrupted at all.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    noise: bool,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Multiplier on the 0.001 base learning rate.
    #[arg(long, default_value_t = 0.3)]
    lr: f64,
    #[arg(long, default_value = "results")]
    result_dir: PathBuf,
}

#[derive(Debug, Args)]
struct SweepArgs {
    #[arg(long, default_value_t = 20)]
    n_elems: usize,
    #[arg(long, default_value_t = 25600)]
    n_train_samples: usize,
    #[arg(long, default_value_t = 1000)]
    n_eval_samples: usize,
    #[arg(long, default_value_t = 1000)]
    n_epochs: usize,
    #[arg(long, default_value_t = 1)]
    n_layers: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, default_value_t = 0.3)]
    lr: f64,
    #[arg(long, default_value = "results")]
    result_dir: PathBuf,
}

pub fn parse_command() -> AppCommand {
    from_cli(Cli::parse())
}

pub fn try_command_from_iter<I, T>(iter: I) -> Result<AppCommand, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(iter)?;
    Ok(from_cli(cli))
}

fn from_cli(cli: Cli) -> AppCommand {
    match cli.command {
        CliCommand::Train(args) => AppCommand::Train(TrainConfig {
            n_elems: args.n_elems,
            n_train_samples: args.n_train_samples,
            n_eval_samples: args.n_eval_samples,
            n_epochs: args.n_epochs,
            base_noisy_label: args.noisy_label,
            n_layers: args.n_layers,
            noise: args.noise,
            seed: args.seed,
            lr: args.lr,
            result_dir: args.result_dir,
        }),
        CliCommand::Sweep(args) => AppCommand::Sweep(SweepConfig {
            n_elems: args.n_elems,
            n_train_samples: args.n_train_samples,
            n_eval_samples: args.n_eval_samples,
            n_epochs: args.n_epochs,
            n_layers: args.n_layers,
            seed: args.seed,
            lr: args.lr,
            result_dir: args.result_dir,
        }),
    }
}

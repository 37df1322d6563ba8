use std::process;

use parity_curriculum::{cli, config::AppCommand, experiments, training};

fn main() {
    match cli::parse_command() {
        AppCommand::Train(config) => match training::run(&config) {
            Ok(outcome) => println!("{outcome}"),
            Err(err) => {
                eprintln!("train failed: {err}");
                process::exit(1);
            }
        },
        AppCommand::Sweep(config) => match experiments::run_sweep(&config) {
            Ok(report) => println!("{report}"),
            Err(err) => {
                eprintln!("sweep failed: {err}");
                process::exit(1);
            }
        },
    }
}

use clap::Parser;
use dpae_cli::{failure_exit_code, run, Cli};

fn main() {
    match run(Cli::parse()) {
        Ok(completion) => std::process::exit(completion.exit_code()),
        Err(err) => {
            eprintln!("application error: {err}");
            std::process::exit(failure_exit_code(&err));
        }
    }
}

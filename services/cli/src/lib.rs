mod cli;
mod input;

pub use cli::{failure_exit_code, run, submission_mode, write_report, Cli, Completion};
pub use input::load_declaration;

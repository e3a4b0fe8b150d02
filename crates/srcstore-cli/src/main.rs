use srcstore_core::logging;

mod cli;

use crate::cli::CliCommand;

fn main() {
    // Log file under the XDG state dir; stderr if that cannot be opened.
    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    if let Err(err) = CliCommand::run_from_args() {
        eprintln!("srcstore error: {:#}", err);
        std::process::exit(1);
    }
}

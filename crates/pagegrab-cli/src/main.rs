use pagegrab_core::logging;

mod cli;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse_args();

    // Log to the state file; stderr if that is not possible.
    if logging::init_logging(cli.verbose).is_err() {
        logging::init_logging_stderr(cli.verbose);
    }

    if let Err(err) = cli.run() {
        eprintln!("pagegrab error: {:#}", err);
        std::process::exit(1);
    }
}

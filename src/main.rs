//! Provides the main entry point to the program.
use human_panic::{metadata, setup_panic};
use portfolio_match::cli::run_cli;
use portfolio_match::log;

fn main() {
    setup_panic!(
        metadata!().support("Please report this as an issue on the project's issue tracker")
    );

    if let Err(err) = run_cli() {
        if log::is_logger_initialised() {
            ::log::error!("{err:?}");
        } else {
            eprintln!("Error: {err:?}");
        }

        std::process::exit(1);
    }
}

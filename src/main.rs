//! Uncaught CLI entry point.

use clap::error::ErrorKind;
use clap::Parser;
use uncaught::cli::{self, Cli, EXIT_USAGE};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version are not invocation errors.
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                e.exit();
            }
            let _ = e.print();
            std::process::exit(EXIT_USAGE);
        }
    };

    let exit_code = match cli::run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_USAGE
        }
    };

    std::process::exit(exit_code);
}

//! Radiante CLI

use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use tracing::error;

mod kdm;

/// Returns the version of the crate.
pub const fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Flag for verbose output
const VERBOSE_FLAG: &str = "verbose";

/// Entrypoint for the Radiante CLI
fn main() -> std::process::ExitCode {
    // Define application
    let matches = Command::new("radiante")
        .version(crate_version())
        .about("Work with game data files.")
        .arg(
            Arg::new(VERBOSE_FLAG)
                .short('v')
                .long(VERBOSE_FLAG)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new(kdm::CMD)
                .about("Convert MapData key-data containers to and from JSON.")
                .subcommand_required(true)
                .subcommand(
                    Command::new(kdm::DECODE_CMD)
                        .about("Parse a KDM file and write its state as JSON.")
                        .arg(
                            Arg::new("input")
                                .long("input")
                                .required(true)
                                .help("Path to the KDM file")
                                .value_parser(clap::value_parser!(PathBuf)),
                        )
                        .arg(
                            Arg::new("output")
                                .long("output")
                                .help("Path to write JSON to (stdout if omitted)")
                                .value_parser(clap::value_parser!(PathBuf)),
                        ),
                )
                .subcommand(
                    Command::new(kdm::ENCODE_CMD)
                        .about("Build a KDM file from a JSON state.")
                        .arg(
                            Arg::new("input")
                                .long("input")
                                .required(true)
                                .help("Path to the JSON state")
                                .value_parser(clap::value_parser!(PathBuf)),
                        )
                        .arg(
                            Arg::new("output")
                                .long("output")
                                .required(true)
                                .help("Path to write the KDM file to")
                                .value_parser(clap::value_parser!(PathBuf)),
                        ),
                )
                .subcommand(
                    Command::new(kdm::INSPECT_CMD)
                        .about("Log the layout, symbols, and strings of a KDM file.")
                        .arg(
                            Arg::new("input")
                                .long("input")
                                .required(true)
                                .help("Path to the KDM file")
                                .value_parser(clap::value_parser!(PathBuf)),
                        ),
                ),
        )
        .get_matches();

    // Create logger
    let level = if matches.get_flag(VERBOSE_FLAG) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    // Parse subcommands
    if let Some(kdm_matches) = matches.subcommand_matches(kdm::CMD) {
        match kdm_matches.subcommand() {
            Some((kdm::DECODE_CMD, matches)) => {
                let input = matches.get_one::<PathBuf>("input").unwrap();
                let output = matches.get_one::<PathBuf>("output");
                if let Err(e) = kdm::decode(input, output) {
                    error!(error=?e, "failed to decode KDM file");
                } else {
                    return std::process::ExitCode::SUCCESS;
                }
            }
            Some((kdm::ENCODE_CMD, matches)) => {
                let input = matches.get_one::<PathBuf>("input").unwrap();
                let output = matches.get_one::<PathBuf>("output").unwrap();
                if let Err(e) = kdm::encode(input, output) {
                    error!(error=?e, "failed to encode KDM file");
                } else {
                    return std::process::ExitCode::SUCCESS;
                }
            }
            Some((kdm::INSPECT_CMD, matches)) => {
                let input = matches.get_one::<PathBuf>("input").unwrap();
                if let Err(e) = kdm::inspect(input) {
                    error!(error=?e, "failed to inspect KDM file");
                } else {
                    return std::process::ExitCode::SUCCESS;
                }
            }
            Some((cmd, _)) => {
                error!(cmd, "invalid subcommand");
            }
            None => {
                error!("no subcommand provided");
            }
        }
    } else {
        error!("no subcommand provided");
    }
    std::process::ExitCode::FAILURE
}

//! querytag CLI binary.

use std::io::Write;
use std::process;

use clap::Parser;
use env_logger::{Builder, Env};
use log::LevelFilter;

use querytag::cli::args::*;
use querytag::cli::commands::*;

fn main() {
    // Parse command line arguments using clap
    let args = QuerytagArgs::parse();

    // RUST_LOG, when set, refines the level chosen by -v/-q
    let log_level = match args.verbosity() {
        0 => LevelFilter::Error, // Quiet mode
        1 => LevelFilter::Warn,  // Default
        2 => LevelFilter::Info,  // Verbose
        _ => LevelFilter::Debug, // Very verbose (3+)
    };

    let mut builder = Builder::new();
    builder.filter_level(log_level);
    builder.parse_env(Env::default());

    match args.log_format {
        LogFormat::Text => {
            builder.format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()));
        }
        LogFormat::Json => {
            builder.format(|buf, record| {
                let line = serde_json::json!({
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "level": record.level().as_str(),
                    "target": record.target(),
                    "message": record.args().to_string(),
                });
                writeln!(buf, "{line}")
            });
        }
    }
    builder.init();

    // Execute the command
    if let Err(e) = execute_command(args) {
        log::debug!("{e:?}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

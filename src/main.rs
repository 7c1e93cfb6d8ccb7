//! Command-line front end.
//!
//! ```bash
//! # YAML to stdout, scanning one directory
//! openapi-from-source ./my-api-project -l src/routes
//!
//! # JSON into ./docs/openapi.json, settings from a file
//! openapi-from-source ./my-api-project -c openapi.yaml -f json -d docs
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_source::cli;

fn main() -> Result<()> {
    // The verbose flag decides the log level, so arguments are parsed before
    // the logger exists and validated after.
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("openapi-from-source {}", env!("CARGO_PKG_VERSION"));

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    info!("OpenAPI document generation completed successfully");

    Ok(())
}

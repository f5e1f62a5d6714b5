//! # media-sweep CLI
//!
//! Command-line interface for the media sweeper.
//!
//! ## Usage
//! ```bash
//! media-sweep dedup run ~/Photos --strategy content --plan
//! media-sweep cleanup rename ~/Photos/2023 --apply
//! ```

mod cli;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}

//! Log dispatch for the `bagseg` binary.
//!
//! Library code only uses the `log` macros; the binary installs a `fern`
//! dispatch writing to stderr and to a file in the logs directory.

use std::fs;
use std::path::Path;

use log::LevelFilter;

use crate::error::BagsegError;

pub const LOG_FILE_NAME: &str = "bagseg.log";

/// Install the global logger. Call once per process.
pub fn setup_logger(logs_dir: &Path, verbose: bool) -> Result<(), BagsegError> {
    fs::create_dir_all(logs_dir).map_err(BagsegError::Io)?;
    let log_file = fern::log_file(logs_dir.join(LOG_FILE_NAME)).map_err(BagsegError::Io)?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .chain(std::io::stderr())
        .chain(log_file)
        .apply()
        .map_err(|source| BagsegError::Logger {
            message: source.to_string(),
        })
}

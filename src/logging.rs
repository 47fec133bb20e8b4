//! Logging bootstrap.
//!
//! stdout carries IPC responses, so log lines go to stderr or to rotating
//! files. Events are `key=value` metadata only; student names and ids are
//! never logged.

use crate::config::Config;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info, warn};
use once_cell::sync::OnceCell;

const LOG_FILE_BASENAME: &str = "attendanced";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;

static LOGGER: OnceCell<LoggerHandle> = OnceCell::new();

/// Starts the logger once per process. Later calls are no-ops.
pub fn init_logging(config: &Config) -> anyhow::Result<()> {
    LOGGER.get_or_try_init(|| -> anyhow::Result<LoggerHandle> {
        let logger = Logger::try_with_str(config.log_level)?;
        let handle = match &config.log_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                logger
                    .log_to_file(
                        FileSpec::default()
                            .directory(dir.as_path())
                            .basename(LOG_FILE_BASENAME),
                    )
                    .rotate(
                        Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                        Naming::Numbers,
                        Cleanup::KeepLogFiles(MAX_LOG_FILES),
                    )
                    .write_mode(WriteMode::BufferAndFlush)
                    .append()
                    .format(flexi_logger::detailed_format)
                    .start()?
            }
            None => logger
                .log_to_stderr()
                .format(flexi_logger::detailed_format)
                .start()?,
        };
        install_panic_hook();
        Ok(handle)
    })?;

    info!(
        "event=app_start status=ok version={} level={} sink={}",
        env!("CARGO_PKG_VERSION"),
        config.log_level,
        if config.log_dir.is_some() { "file" } else { "stderr" }
    );
    for w in &config.warnings {
        warn!("event=config_fallback message={:?}", w);
    }
    Ok(())
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());
        error!("event=panic location={}", location);
        if let Some(handle) = LOGGER.get() {
            handle.flush();
        }
        previous(panic_info);
    }));
}

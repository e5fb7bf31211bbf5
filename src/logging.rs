//! Console logging through `env_logger`, with error records also appended to
//! a log file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Forwards every record to an inner logger and appends `ERROR` records to a
/// file as `ERROR:<target>:<message>` lines.
pub struct ErrorFileLogger<L> {
    inner: L,
    file: Mutex<File>,
}

impl<L: Log> ErrorFileLogger<L> {
    pub fn new(inner: L, path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            inner,
            file: Mutex::new(file),
        })
    }
}

impl<L: Log> Log for ErrorFileLogger<L> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() == Level::Error || self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if record.level() == Level::Error {
            if let Ok(mut file) = self.file.lock() {
                // a failing log sink has nowhere to report to
                let _ = writeln!(file, "ERROR:{}:{}", record.target(), record.args());
            }
        }
        if self.inner.enabled(record.metadata()) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
        self.inner.flush();
    }
}

/// Install the process-wide logger. `RUST_LOG` overrides `default_filter`.
pub fn init(default_filter: &str, error_log: &Path) -> anyhow::Result<()> {
    let console = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter),
    )
    .build();
    let max_level = console.filter().max(LevelFilter::Error);

    let logger = ErrorFileLogger::new(console, error_log)
        .with_context(|| format!("opening error log {}", error_log.display()))?;
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(max_level);
    Ok(())
}

//! Console + file logging for the binary.
//!
//! Library code only uses the `log` macros. The binary calls [`init`], which
//! installs `env_logger` with a timestamped format and copies every line to
//! `<logs>/market_collector.log`.

use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

pub const LOG_FILE_NAME: &str = "market_collector.log";

/// Writes to stdout and, when available, to the log file.
struct TeeWriter {
    file: Option<File>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            // The console copy is enough if the file goes away mid-run
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
        Ok(())
    }
}

/// Installs the global logger. `RUST_LOG` overrides the default `info` level.
pub fn init(log_dir: &Path, verbose: bool) {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE_NAME))
        .ok();
    let file_missing = file.is_none();

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let result = Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}",
                Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(TeeWriter { file })))
        .try_init();

    if result.is_err() {
        // Already initialised (tests, or a second call)
        return;
    }

    if file_missing {
        log::warn!(
            "Could not open {}; logging to console only",
            log_dir.join(LOG_FILE_NAME).display()
        );
    }

    install_panic_hook();
}

/// Routes panics through the logger so they land in the log file too.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        log::error!("[PANIC]{} {}", location, msg);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_tee_writer_appends_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOG_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();

        let mut tee = TeeWriter { file: Some(file) };
        tee.write_all(b"first line\n").unwrap();
        tee.write_all(b"second line\n").unwrap();
        tee.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first line\nsecond line\n");
    }

    #[test]
    fn test_tee_writer_without_file() {
        let mut tee = TeeWriter { file: None };
        assert_eq!(tee.write(b"console only\n").unwrap(), 13);
    }
}

//! Shared logging setup for Courier Flow binaries.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str =
    "courier_dispatch=info,courier_protocol=info,courier_logging=info";
const KEEP_ROTATIONS: usize = 4;
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;

/// Logging configuration shared by Courier binaries.
pub struct LogConfig<'a> {
    pub process_name: &'a str,
    pub verbose: bool,
}

/// Initialize tracing with a size-rotating file writer plus stderr output.
///
/// Filtering follows `COURIER_LOG` when set, falling back to the crate
/// defaults. The console stays at warn level unless `verbose` is set, so
/// tools can keep stdout for their own output.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_log_dir().context("Failed to ensure log directory")?;
    let writer = RotatingWriter::open(log_dir, config.process_name)
        .context("Failed to open rotating log writer")?;

    let console_filter = if config.verbose {
        env_filter()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(env_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .init();

    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("COURIER_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// The Courier home directory: ~/.courier_flow (COURIER_HOME overrides).
pub fn courier_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("COURIER_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .expect("Could not determine home directory")
        .join(".courier_flow")
}

/// The logs directory: ~/.courier_flow/logs
pub fn log_dir() -> PathBuf {
    courier_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_log_dir() -> Result<PathBuf> {
    let dir = log_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    Ok(dir)
}

struct LogFile {
    dir: PathBuf,
    base_name: String,
    file: File,
    written: u64,
}

impl LogFile {
    fn open(dir: PathBuf, base_name: String) -> io::Result<Self> {
        let path = dir.join(format!("{}.log", base_name));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            dir,
            base_name,
            file,
            written,
        })
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.base_name, index))
    }

    /// Shuffle `name.log` -> `name.log.1` -> ... -> `name.log.N`, dropping
    /// the oldest, then reopen a fresh current file.
    fn rotate(&mut self) -> io::Result<()> {
        let _ = self.file.flush();

        let oldest = self.rotated_path(KEEP_ROTATIONS);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..KEEP_ROTATIONS).rev() {
            let src = self.rotated_path(index);
            if src.exists() {
                fs::rename(&src, self.rotated_path(index + 1))?;
            }
        }
        let current = self.dir.join(format!("{}.log", self.base_name));
        if current.exists() {
            fs::rename(&current, self.rotated_path(1))?;
        }

        let reopened = Self::open(self.dir.clone(), self.base_name.clone())?;
        self.file = reopened.file;
        self.written = reopened.written;
        Ok(())
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() as u64 > ROTATE_AT_BYTES {
            self.rotate()?;
        }
        let bytes = self.file.write(buf)?;
        self.written += bytes as u64;
        Ok(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Cloneable handle handed to the tracing layer; each write locks the
/// underlying file so rotation stays consistent across threads.
#[derive(Clone)]
struct RotatingWriter {
    inner: Arc<Mutex<LogFile>>,
}

impl RotatingWriter {
    fn open(dir: PathBuf, process_name: &str) -> Result<Self> {
        let file = LogFile::open(dir, sanitize_name(process_name))
            .with_context(|| format!("Failed to open log file for {}", process_name))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RotatingWriter {
    type Writer = RotatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        file.flush()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

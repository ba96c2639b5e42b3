//! Append-only debug trace of every request/response/tool exchange.
//!
//! Only active when the debug flag is set. Write failures are swallowed;
//! tracing must never break a run.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Trace {
    path: Option<PathBuf>,
}

impl Trace {
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn enabled() -> Self {
        Self {
            path: dirs::data_dir().map(|d| d.join("shellm").join("debug.log")),
        }
    }

    pub fn from_flag(debug: bool) -> Self {
        if debug {
            Self::enabled()
        } else {
            Self::disabled()
        }
    }

    /// Trace to a specific file, regardless of the default location.
    pub fn at(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Append one labeled, timestamped record.
    pub fn log<T: Serialize + ?Sized>(&self, label: &str, data: &T) {
        let Some(path) = &self.path else { return };
        if let Err(e) = write_entry(path, label, data) {
            tracing::debug!("trace write failed: {e}");
        }
    }
}

fn write_entry<T: Serialize + ?Sized>(
    path: &PathBuf,
    label: &str,
    data: &T,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let body = serde_json::to_string_pretty(data)
        .unwrap_or_else(|_| "<unserializable payload>".to_string());

    let separator = "=".repeat(72);
    writeln!(file, "\n{}", separator)?;
    writeln!(file, "[{}] {}", timestamp, label)?;
    writeln!(file, "{}", separator)?;
    writeln!(file, "{}", body)?;
    Ok(())
}

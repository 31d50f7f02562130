use chrono::Local;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::session::Handoff;

/// One line of `log.csv`.
#[derive(Debug, Serialize)]
struct LogRow<'a> {
    date: String,
    mode: String,
    title: &'a str,
    elapsed_ms: u64,
    ghost_text: bool,
    full_text: bool,
    autocorrect: bool,
}

impl<'a> LogRow<'a> {
    fn new(handoff: &'a Handoff, date: String) -> Self {
        Self {
            date,
            mode: handoff.mode.to_string(),
            title: &handoff.title,
            elapsed_ms: handoff.elapsed_ms,
            ghost_text: handoff.assistance.ghost_text,
            full_text: handoff.assistance.full_text,
            autocorrect: handoff.assistance.autocorrect,
        }
    }
}

/// Append-only CSV history of finished sessions.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn open_default() -> Option<Self> {
        AppDirs::session_log_path().map(Self::with_path)
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, handoff: &Handoff) -> io::Result<()> {
        self.append_dated(handoff, Local::now().format("%c").to_string())
    }

    fn append_dated(&self, handoff: &Handoff, date: String) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // header only goes into a fresh file
        let needs_header = !self.path.exists();

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(LogRow::new(handoff, date))?;
        writer.flush()?;
        Ok(())
    }
}

//! Per-run structured log: a JSON-lines file whose first line describes the
//! bot, followed by one entry per node outcome.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::domain::vocabulary::{BOT_NAME, BOT_PROPERTIES, BOT_TAGS};

pub const RUN_ID_FORMAT: &str = "%Y%m%d_%H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub name: String,
    pub tags: Vec<String>,
    pub properties: Vec<String>,
    pub run_id: String,
}

impl RunMetadata {
    pub fn for_bot(run_id: impl Into<String>) -> Self {
        Self {
            name: BOT_NAME.to_string(),
            tags: BOT_TAGS.iter().map(|t| t.to_string()).collect(),
            properties: BOT_PROPERTIES.iter().map(|p| p.to_string()).collect(),
            run_id: run_id.into(),
        }
    }

    pub fn run_id_at(time: DateTime<Local>) -> String {
        time.format(RUN_ID_FORMAT).to_string()
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}.log", self.name, self.run_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub external_id: String,
    pub external_id_prop: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn success(
        external_id: impl Into<String>,
        external_id_prop: impl Into<String>,
        record_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level: LogLevel::Info,
            external_id: external_id.into(),
            external_id_prop: external_id_prop.into(),
            record_id,
            message: message.into(),
            msg_type: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        external_id: impl Into<String>,
        external_id_prop: impl Into<String>,
        message: impl Into<String>,
        msg_type: impl Into<String>,
    ) -> Self {
        Self {
            level: LogLevel::Error,
            external_id: external_id.into(),
            external_id_prop: external_id_prop.into(),
            record_id: None,
            message: message.into(),
            msg_type: Some(msg_type.into()),
            timestamp: Utc::now(),
        }
    }
}

pub struct RunLog {
    metadata: RunMetadata,
    path: Option<PathBuf>,
    writer: Mutex<Option<BufWriter<File>>>,
    entries: Mutex<Vec<LogEntry>>,
}

impl RunLog {
    /// Creates `<log_dir>/DOIDBot-<run_id>.log` and writes the header line.
    pub fn create(log_dir: impl AsRef<Path>, metadata: RunMetadata) -> Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)
            .with_context(|| format!("cannot create log directory {:?}", log_dir))?;
        let path = log_dir.join(metadata.file_name());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("cannot open run log {:?}", path))?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &metadata)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        Ok(Self {
            metadata,
            path: Some(path),
            writer: Mutex::new(Some(writer)),
            entries: Mutex::new(Vec::new()),
        })
    }

    /// A log that only keeps entries in memory.
    pub fn in_memory(metadata: RunMetadata) -> Self {
        Self {
            metadata,
            path: None,
            writer: Mutex::new(None),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, entry: LogEntry) -> Result<()> {
        if let Some(writer) = self.writer.lock().as_mut() {
            serde_json::to_writer(&mut *writer, &entry)?;
            writer.write_all(b"\n")?;
            writer.flush().context("cannot flush run log")?;
        }
        self.entries.lock().push(entry);
        Ok(())
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }
}

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

const LOG_FILE: &str = "change_log.jsonl";
const MAX_ENTRIES: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeLogEntry {
    pub timestamp: String,
    pub command: String,
    pub path: PathBuf,
    pub action: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub struct ChangeLog {
    dir: Option<PathBuf>,
}

impl ChangeLog {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: Some(dir.to_path_buf()),
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    fn file(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(LOG_FILE))
    }

    pub fn record(&self, command: &str, path: &Path, action: &str, tags: &[String]) -> Result<()> {
        let (Some(dir), Some(log_path)) = (&self.dir, self.file()) else {
            return Ok(());
        };
        if !dir.exists() {
            fs::create_dir_all(dir).with_context(|| format!("creating {dir:?}"))?;
        }
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".into());
        let entry = ChangeLogEntry {
            timestamp,
            command: command.to_string(),
            path: path.to_path_buf(),
            action: action.to_string(),
            tags: tags.to_vec(),
        };
        let json = serde_json::to_string(&entry)?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&log_path)
            .with_context(|| format!("opening {log_path:?}"))?;
        writeln!(file, "{json}")?;
        truncate_log(&log_path)?;
        Ok(())
    }

    /// The newest `tail` entries, oldest first. Unparseable lines are skipped.
    pub fn read_recent(&self, tail: usize) -> Result<Vec<ChangeLogEntry>> {
        let Some(log_path) = self.file().filter(|path| path.exists()) else {
            return Ok(Vec::new());
        };
        let file = fs::File::open(&log_path).with_context(|| format!("reading {log_path:?}"))?;
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if let Ok(entry) = serde_json::from_str::<ChangeLogEntry>(&line) {
                entries.push(entry);
            }
        }
        let skip = entries.len().saturating_sub(tail);
        Ok(entries.split_off(skip))
    }
}

fn truncate_log(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .with_context(|| format!("reading {path:?}"))?;
    let reader = BufReader::new(file);
    let lines: Vec<_> = reader.lines().collect::<Result<_, _>>()?;
    if lines.len() <= MAX_ENTRIES {
        return Ok(());
    }
    let keep = &lines[lines.len() - MAX_ENTRIES..];
    fs::write(path, keep.join("\n") + "\n")?;
    Ok(())
}

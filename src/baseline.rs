//! Append-only log of approved baselines.
//!
//! Versions of the same named baseline form a chain through
//! `previous: Option<BaselineId>`, an index into the log itself. Entries are
//! never rewritten, so a chain can only point backwards and cannot cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, VsmeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaselineId(pub usize);

impl fmt::Display for BaselineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineEntry {
    pub id: BaselineId,
    pub name: String,
    pub image_path: PathBuf,
    pub approved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<BaselineId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineLog {
    #[serde(default)]
    entries: Vec<BaselineEntry>,
}

impl BaselineLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a log file; a missing file is an empty log.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = std::fs::read_to_string(path)?;
        let log: BaselineLog = serde_json::from_str(&data)?;
        log.check()?;
        Ok(log)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Ids must equal positions and links must point strictly backwards.
    fn check(&self) -> Result<()> {
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.id.0 != index {
                return Err(VsmeError::config(format!(
                    "baseline log entry {index} has id {}",
                    entry.id
                )));
            }
            if let Some(prev) = entry.previous {
                if prev.0 >= index {
                    return Err(VsmeError::config(format!(
                        "baseline {} links forward to {prev}",
                        entry.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Records a newly approved image as the latest version of `name`.
    pub fn append(&mut self, name: &str, image_path: impl Into<PathBuf>) -> BaselineId {
        self.append_at(name, image_path, Utc::now())
    }

    pub fn append_at(
        &mut self,
        name: &str,
        image_path: impl Into<PathBuf>,
        approved_at: DateTime<Utc>,
    ) -> BaselineId {
        let id = BaselineId(self.entries.len());
        let previous = self.latest(name).map(|e| e.id);
        self.entries.push(BaselineEntry {
            id,
            name: name.to_string(),
            image_path: image_path.into(),
            approved_at,
            previous,
        });
        id
    }

    pub fn get(&self, id: BaselineId) -> Option<&BaselineEntry> {
        self.entries.get(id.0)
    }

    pub fn latest(&self, name: &str) -> Option<&BaselineEntry> {
        self.entries.iter().rev().find(|e| e.name == name)
    }

    /// Versions of `name`, newest first, following the `previous` chain.
    pub fn history(&self, name: &str) -> Vec<&BaselineEntry> {
        let mut chain = Vec::new();
        let mut cursor = self.latest(name);
        while let Some(entry) = cursor {
            chain.push(entry);
            cursor = entry.previous.and_then(|prev| self.get(prev));
        }
        chain
    }

    pub fn entries(&self) -> &[BaselineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! File-backed store using JSON lines.
//!
//! Every `save` and `update_status` appends the full record as one line and
//! syncs the file; on open the log is replayed and the last line for each id
//! wins. `compact` rewrites the log with one line per id.

use std::collections::HashMap;
use std::fs::{create_dir_all, rename, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use uuid::Uuid;

use super::StoredRecord;
use crate::core::{EngineError, Store, WorkItem};

struct FileState {
    index: HashMap<Uuid, StoredRecord>,
    log: Option<File>,
    appended_since_compact: usize,
}

/// Durable store backed by an append-only JSONL file.
pub struct JsonlStore {
    path: PathBuf,
    stream: String,
    state: Mutex<FileState>,
}

impl JsonlStore {
    /// Open (or create) the log `<dir>/<stream>.jsonl` and replay it.
    ///
    /// # Errors
    ///
    /// `EngineError::Store` on I/O failure or a malformed line.
    pub fn open(dir: impl AsRef<Path>, stream: impl Into<String>) -> Result<Self, EngineError> {
        let path = dir.as_ref().to_path_buf();
        let stream = stream.into();
        create_dir_all(&path).map_err(EngineError::store)?;
        let file_path = path.join(format!("{stream}.jsonl"));
        let index = Self::replay(&file_path)?;
        let log = Self::open_append(&file_path)?;
        tracing::debug!(path = %file_path.display(), records = index.len(), "opened jsonl store");
        Ok(Self {
            path,
            stream,
            state: Mutex::new(FileState {
                index,
                log: Some(log),
                appended_since_compact: 0,
            }),
        })
    }

    fn file_path(&self) -> PathBuf {
        self.path.join(format!("{}.jsonl", self.stream))
    }

    fn open_append(file_path: &Path) -> Result<File, EngineError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)
            .map_err(EngineError::store)
    }

    fn replay(file_path: &Path) -> Result<HashMap<Uuid, StoredRecord>, EngineError> {
        let mut index = HashMap::new();
        if !file_path.exists() {
            return Ok(index);
        }
        let file = File::open(file_path).map_err(EngineError::store)?;
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(EngineError::store)?;
            if line.trim().is_empty() {
                continue;
            }
            let record: StoredRecord = serde_json::from_str(&line)
                .map_err(|e| EngineError::Store(format!("line {}: {e}", lineno + 1)))?;
            index.insert(record.id, record);
        }
        Ok(index)
    }

    fn append(state: &mut FileState, record: &StoredRecord) -> Result<(), EngineError> {
        let log = state
            .log
            .as_mut()
            .ok_or_else(|| EngineError::Store("store is closed".into()))?;
        let line = serde_json::to_string(record).map_err(EngineError::store)?;
        writeln!(log, "{line}").map_err(EngineError::store)?;
        log.sync_data().map_err(EngineError::store)?;
        state.appended_since_compact += 1;
        Ok(())
    }

    /// Rewrite the log so it holds exactly one line per record.
    ///
    /// # Errors
    ///
    /// `EngineError::Store` on I/O failure or if the store is closed.
    pub fn compact(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.log.is_none() {
            return Err(EngineError::Store("store is closed".into()));
        }
        self.rewrite(&state.index)?;
        state.log = Some(Self::open_append(&self.file_path())?);
        state.appended_since_compact = 0;
        Ok(())
    }

    fn rewrite(&self, index: &HashMap<Uuid, StoredRecord>) -> Result<(), EngineError> {
        let tmp_path = self.path.join(format!("{}.jsonl.tmp", self.stream));
        {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .map_err(EngineError::store)?;
            let mut writer = BufWriter::new(file);
            for record in index.values() {
                let line = serde_json::to_string(record).map_err(EngineError::store)?;
                writeln!(writer, "{line}").map_err(EngineError::store)?;
            }
            let file = writer.into_inner().map_err(EngineError::store)?;
            file.sync_all().map_err(EngineError::store)?;
        }
        rename(&tmp_path, self.file_path()).map_err(EngineError::store)
    }

    /// Fetch one record.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<StoredRecord> {
        self.state.lock().index.get(&id).cloned()
    }

    /// All records, in no particular order.
    #[must_use]
    pub fn records(&self) -> Vec<StoredRecord> {
        self.state.lock().index.values().cloned().collect()
    }

    /// Lines appended since the log was opened or last compacted.
    #[must_use]
    pub fn appended_since_compact(&self) -> usize {
        self.state.lock().appended_since_compact
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().log.is_none()
    }
}

impl Store for JsonlStore {
    fn recover_pending(&self) -> Result<Vec<WorkItem>, EngineError> {
        self.state
            .lock()
            .index
            .values()
            .filter(|r| r.status.is_recoverable())
            .map(StoredRecord::to_item)
            .collect()
    }

    fn save(&self, item: &WorkItem) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.index.contains_key(&item.id()) {
            return Err(EngineError::Store(format!("duplicate id {}", item.id())));
        }
        let record = StoredRecord::from(item);
        Self::append(&mut state, &record)?;
        state.index.insert(record.id, record);
        Ok(())
    }

    fn update_status(&self, item: &WorkItem) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let mut record = state
            .index
            .get(&item.id())
            .cloned()
            .ok_or_else(|| EngineError::Store(format!("unknown id {}", item.id())))?;
        record.status = item.status();
        record.retry_count = item.retry_count();
        Self::append(&mut state, &record)?;
        state.index.insert(record.id, record);
        Ok(())
    }

    fn close(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.log.is_none() {
            return Ok(());
        }
        self.rewrite(&state.index)?;
        state.log = None;
        tracing::debug!(path = %self.file_path().display(), "closed jsonl store");
        Ok(())
    }
}

impl std::fmt::Debug for JsonlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlStore")
            .field("path", &self.file_path())
            .finish_non_exhaustive()
    }
}

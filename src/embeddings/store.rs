use super::Record;
use crate::error::{QnaError, Result};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Durable collection of records.
///
/// Implementations are shared between request tasks, so every method takes
/// `&self` and must hand out point-in-time snapshots.
pub trait RecordStore: Send + Sync {
    /// Validate and persist a new record
    fn append(&self, text: &str, embedding: Vec<f32>) -> Result<Record>;

    /// Every persisted record, in insertion order
    fn all_records(&self) -> Result<Vec<Record>>;

    fn stats(&self) -> Result<StoreStats>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub total_records: usize,
    /// Established embedding dimension, if any record or configuration fixed it
    pub dimension: Option<usize>,
    /// Size of the backing file; `None` for in-memory stores
    pub disk_bytes: Option<u64>,
}

#[derive(Debug, Default)]
struct Records {
    records: Vec<Record>,
    dimension: Option<usize>,
}

impl Records {
    fn check(&self, text: &str, embedding: &[f32]) -> Result<()> {
        if text.trim().is_empty() {
            return Err(QnaError::EmptyText);
        }
        if embedding.is_empty() {
            return Err(QnaError::EmptyEmbedding);
        }
        if let Some(expected) = self.dimension {
            if embedding.len() != expected {
                return Err(QnaError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }
        Ok(())
    }

    fn push(&mut self, record: Record) {
        // Vectorless legacy records never establish the dimension
        if self.dimension.is_none() && record.dimension() > 0 {
            self.dimension = Some(record.dimension());
        }
        self.records.push(record);
    }

    fn stats(&self, disk_bytes: Option<u64>) -> StoreStats {
        StoreStats {
            total_records: self.records.len(),
            dimension: self.dimension,
            disk_bytes,
        }
    }
}

fn read_lock(lock: &RwLock<Records>) -> Result<RwLockReadGuard<'_, Records>> {
    lock.read()
        .map_err(|_| QnaError::StoreUnavailable("record lock poisoned".into()))
}

fn write_lock(lock: &RwLock<Records>) -> Result<RwLockWriteGuard<'_, Records>> {
    lock.write()
        .map_err(|_| QnaError::StoreUnavailable("record lock poisoned".into()))
}

/// Store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose dimension is fixed before the first record arrives
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            inner: RwLock::new(Records {
                records: Vec::new(),
                dimension: Some(dimension),
            }),
        }
    }
}

impl RecordStore for MemoryStore {
    fn append(&self, text: &str, embedding: Vec<f32>) -> Result<Record> {
        let mut inner = write_lock(&self.inner)?;
        inner.check(text, &embedding)?;
        let record = Record::new(text.to_string(), embedding);
        inner.push(record.clone());
        Ok(record)
    }

    fn all_records(&self) -> Result<Vec<Record>> {
        Ok(read_lock(&self.inner)?.records.clone())
    }

    fn stats(&self) -> Result<StoreStats> {
        Ok(read_lock(&self.inner)?.stats(None))
    }
}

/// JSON Lines file store, one record per line.
///
/// The whole file is loaded at open; appends write and sync one line while
/// holding the write lock, so readers never observe a record that is not on
/// disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: RwLock<Records>,
}

impl FileStore {
    /// Open the store at `path`, creating parent directories as needed.
    ///
    /// `dimension` pins the expected embedding length; otherwise the first
    /// stored record establishes it.
    pub fn open(path: impl Into<PathBuf>, dimension: Option<usize>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(unavailable)?;
            }
        }

        let mut inner = Records {
            records: Vec::new(),
            dimension,
        };

        if path.exists() {
            for record in load_records(&path)? {
                if let Some(expected) = inner.dimension {
                    if record.dimension() != expected {
                        tracing::warn!(
                            record = %record.id,
                            expected,
                            actual = record.dimension(),
                            "stored record has unexpected embedding dimension"
                        );
                    }
                }
                inner.push(record);
            }
        }

        tracing::debug!(
            path = %path.display(),
            records = inner.records.len(),
            dimension = ?inner.dimension,
            "opened record store"
        );

        Ok(Self {
            path,
            inner: RwLock::new(inner),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line, rolling the file back to its previous length on failure.
    ///
    /// A torn tail left by a crash is terminated first so the new record starts
    /// on its own line.
    fn write_line(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(unavailable)?;
        let previous_len = file.metadata().map_err(unavailable)?.len();
        let needs_newline = previous_len > 0 && !ends_with_newline(&mut file, previous_len)?;

        let mut buf = Vec::with_capacity(line.len() + 2);
        if needs_newline {
            buf.push(b'\n');
        }
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        let written = file.write_all(&buf).and_then(|_| file.sync_data());

        if let Err(e) = written {
            if let Err(rollback) = file.set_len(previous_len) {
                tracing::warn!(error = %rollback, "failed to roll back partial record write");
            }
            return Err(unavailable(e));
        }
        Ok(())
    }
}

impl RecordStore for FileStore {
    fn append(&self, text: &str, embedding: Vec<f32>) -> Result<Record> {
        let mut inner = write_lock(&self.inner)?;
        inner.check(text, &embedding)?;

        let record = Record::new(text.to_string(), embedding);
        let line = serde_json::to_string(&record)?;
        self.write_line(&line)?;

        inner.push(record.clone());
        Ok(record)
    }

    fn all_records(&self) -> Result<Vec<Record>> {
        Ok(read_lock(&self.inner)?.records.clone())
    }

    fn stats(&self) -> Result<StoreStats> {
        let disk_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok(read_lock(&self.inner)?.stats(Some(disk_bytes)))
    }
}

/// Decode every line of a store file; undecodable lines are skipped
fn load_records(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path).map_err(unavailable)?;
    let mut records = Vec::new();

    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(
                path = %path.display(),
                line = lineno + 1,
                error = %e,
                "skipping unreadable record"
            ),
        }
    }

    Ok(records)
}

fn ends_with_newline(file: &mut std::fs::File, len: u64) -> Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1)).map_err(unavailable)?;
    file.read_exact(&mut last).map_err(unavailable)?;
    Ok(last[0] == b'\n')
}

fn unavailable(e: std::io::Error) -> QnaError {
    QnaError::StoreUnavailable(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store_path(tmp: &TempDir) -> PathBuf {
        tmp.path().join("data").join("records.jsonl")
    }

    #[test]
    fn test_append_then_snapshot() {
        let store = MemoryStore::new();
        store.append("Paris is the capital of France", vec![1.0, 0.0]).unwrap();
        store.append("The sky is blue", vec![0.0, 1.0]).unwrap();

        let records = store.all_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "Paris is the capital of France");
        assert_eq!(records[1].text, "The sky is blue");
    }

    #[test]
    fn test_empty_text_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(store.append("", vec![1.0]), Err(QnaError::EmptyText)));
        assert!(matches!(store.append("  \n", vec![1.0]), Err(QnaError::EmptyText)));
        assert_eq!(store.stats().unwrap().total_records, 0);
    }

    #[test]
    fn test_first_record_establishes_dimension() {
        let store = MemoryStore::new();
        store.append("three", vec![1.0, 2.0, 3.0]).unwrap();

        let err = store.append("two", vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            QnaError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(store.all_records().unwrap().len(), 1);
    }

    #[test]
    fn test_configured_dimension_applies_to_first_record() {
        let store = MemoryStore::with_dimension(4);
        assert!(matches!(
            store.append("short", vec![1.0]),
            Err(QnaError::DimensionMismatch { .. })
        ));
        assert!(store.append("right", vec![0.0, 1.0, 0.0, 0.0]).is_ok());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = store_path(&tmp);
        {
            let store = FileStore::open(&path, None).unwrap();
            store.append("alpha", vec![1.0, 0.0]).unwrap();
            store.append("beta", vec![0.0, 1.0]).unwrap();
        }

        let reopened = FileStore::open(&path, None).unwrap();
        let records = reopened.all_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "alpha");
        assert_eq!(records[1].embedding, vec![0.0, 1.0]);

        // Dimension comes back from disk
        assert!(matches!(
            reopened.append("gamma", vec![1.0]),
            Err(QnaError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_rejected_append_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = store_path(&tmp);
        let store = FileStore::open(&path, None).unwrap();
        store.append("alpha", vec![1.0, 0.0]).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        assert!(store.append("", vec![1.0, 0.0]).is_err());
        assert!(store.append("beta", vec![1.0, 0.0, 0.0]).is_err());

        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        assert_eq!(store.stats().unwrap().total_records, 1);
    }

    #[test]
    fn test_torn_tail_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = store_path(&tmp);
        {
            let store = FileStore::open(&path, None).unwrap();
            store.append("alpha", vec![1.0, 0.0]).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"id":"abc","text":"half"#).unwrap();

        let reopened = FileStore::open(&path, None).unwrap();
        let records = reopened.all_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "alpha");
    }

    #[test]
    fn test_append_after_torn_tail_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = store_path(&tmp);
        {
            let store = FileStore::open(&path, None).unwrap();
            store.append("alpha", vec![1.0, 0.0]).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"id":"abc","text":"half"#).unwrap();
        drop(file);

        {
            let store = FileStore::open(&path, None).unwrap();
            store.append("beta", vec![0.0, 1.0]).unwrap();
        }

        let reopened = FileStore::open(&path, None).unwrap();
        let texts: Vec<String> = reopened
            .all_records()
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(texts, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_record_without_embedding_does_not_fix_dimension() {
        let tmp = TempDir::new().unwrap();
        let path = store_path(&tmp);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "{\"id\":\"x\",\"text\":\"legacy\",\"created_at\":\"2024-01-01T00:00:00Z\"}\n",
        )
        .unwrap();

        let store = FileStore::open(&path, None).unwrap();
        assert_eq!(store.stats().unwrap().dimension, None);
        store.append("fresh", vec![1.0, 0.0]).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.dimension, Some(2));
    }

    #[test]
    fn test_empty_embedding_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.append("no vector", vec![]),
            Err(QnaError::EmptyEmbedding)
        ));
        store.append("vector", vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(store.stats().unwrap().dimension, Some(3));
    }

    #[test]
    fn test_stats_reports_disk_size() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(store_path(&tmp), None).unwrap();
        assert_eq!(store.stats().unwrap().disk_bytes, Some(0));

        store.append("alpha", vec![1.0, 0.0]).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_records, 1);
        assert_eq!(stats.dimension, Some(2));
        assert!(stats.disk_bytes.unwrap() > 0);
    }

    #[test]
    fn test_concurrent_appends_and_snapshots_are_consistent() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FileStore::open(store_path(&tmp), None).unwrap());

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store
                            .append(&format!("writer {} item {}", w, i), vec![w as f32, i as f32])
                            .unwrap();
                    }
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let mut last = 0;
                for _ in 0..50 {
                    let snapshot = store.all_records().unwrap();
                    assert!(snapshot.len() >= last);
                    assert!(snapshot.iter().all(|r| r.embedding.len() == 2));
                    last = snapshot.len();
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(store.all_records().unwrap().len(), 100);
        let reopened = FileStore::open(store.path(), None).unwrap();
        assert_eq!(reopened.all_records().unwrap().len(), 100);
    }
}

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// Defines the interface for the secondary storage backing a frame store.
///
/// This is a scoped, key-value byte store: each frame block spills to one key
/// with a whole-payload write and restores with a whole-payload read. Keys are
/// stable for the lifetime of a store and deleted at teardown. Implementors
/// are not expected to retry; any I/O failure is propagated to the caller,
/// since a partially spilled block cannot be safely resumed.
pub trait SpillStore: Send + Sync {
    /// Writes the entire payload under `key`, replacing any previous payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be written in full.
    fn write(&self, key: &str, payload: &[u8]) -> io::Result<()>;

    /// Reads back the entire payload stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not exist or the payload cannot be
    /// read in full.
    fn read(&self, key: &str) -> io::Result<Vec<u8>>;

    /// Deletes the payload stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key exists but cannot be removed.
    fn delete(&self, key: &str) -> io::Result<()>;
}

/// Spill store writing one file per block under a scratch directory.
#[derive(Debug)]
pub struct FileSpillStore {
    root: PathBuf,
}

impl FileSpillStore {
    /// Creates the scratch directory if it does not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.bin"))
    }
}

impl SpillStore for FileSpillStore {
    fn write(&self, key: &str, payload: &[u8]) -> io::Result<()> {
        fs::write(self.path(key), payload)
    }

    fn read(&self, key: &str) -> io::Result<Vec<u8>> {
        fs::read(self.path(key))
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        fs::remove_file(self.path(key))
    }
}

/// In-memory spill store, used to exercise the spill/restore machinery in
/// tests without touching the filesystem.
#[derive(Debug, Default)]
pub struct MemorySpillStore {
    payloads: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySpillStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.payloads.lock().expect("spill map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SpillStore for MemorySpillStore {
    fn write(&self, key: &str, payload: &[u8]) -> io::Result<()> {
        self.payloads
            .lock()
            .expect("spill map poisoned")
            .insert(key.to_owned(), payload.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> io::Result<Vec<u8>> {
        self.payloads
            .lock()
            .expect("spill map poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no payload for {key}")))
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        self.payloads
            .lock()
            .expect("spill map poisoned")
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no payload for {key}")))
    }
}

use super::{HashChainEntry, LedgerError};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Persistence behind a [`super::Ledger`]. Access is already serialized by
/// the ledger, so implementations need no locking of their own.
pub trait LedgerStore {
    fn max_sequence(&self) -> Result<Option<u64>, LedgerError>;

    fn entry(&self, icv: u64) -> Result<Option<HashChainEntry>, LedgerError>;

    fn append(&mut self, entry: HashChainEntry) -> Result<(), LedgerError>;

    /// All entries in ICV order.
    fn entries(&self) -> Result<Vec<HashChainEntry>, LedgerError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    entries: BTreeMap<u64, HashChainEntry>,
}

impl MemoryLedgerStore {
    /// Build a store from existing entries, rejecting a repeated ICV.
    pub fn from_entries<I>(entries: I) -> Result<Self, LedgerError>
    where
        I: IntoIterator<Item = HashChainEntry>,
    {
        let mut store = Self::default();
        for entry in entries {
            store.append(entry)?;
        }
        Ok(store)
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn max_sequence(&self) -> Result<Option<u64>, LedgerError> {
        Ok(self.entries.keys().next_back().copied())
    }

    fn entry(&self, icv: u64) -> Result<Option<HashChainEntry>, LedgerError> {
        Ok(self.entries.get(&icv).cloned())
    }

    fn append(&mut self, entry: HashChainEntry) -> Result<(), LedgerError> {
        match self.entries.entry(entry.icv) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateSequence { icv: entry.icv }),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    fn entries(&self) -> Result<Vec<HashChainEntry>, LedgerError> {
        Ok(self.entries.values().cloned().collect())
    }
}

/// Append-only file of newline-delimited JSON entries.
///
/// The file is read once on open; every append is written and synced
/// before it becomes visible in memory.
#[derive(Debug)]
pub struct NdjsonLedgerStore {
    path: PathBuf,
    cache: MemoryLedgerStore,
    // last line on disk has no terminating newline
    unterminated: bool,
}

impl NdjsonLedgerStore {
    /// Open `path`, creating it on first append if it does not exist.
    ///
    /// # Errors
    /// [`LedgerError::Corrupt`] names the first line that is not a valid
    /// entry and [`LedgerError::DuplicateLine`] the first line that repeats
    /// an ICV already seen.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let mut cache = MemoryLedgerStore::default();
        let mut unterminated = false;
        if path.exists() {
            unterminated = !ends_with_newline(&path)?;
            let reader = BufReader::new(File::open(&path)?);
            for (index, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let entry: HashChainEntry = serde_json::from_str(&line)
                    .map_err(|source| LedgerError::Corrupt {
                        line: index + 1,
                        source,
                    })?;
                let icv = entry.icv;
                cache.append(entry).map_err(|err| match err {
                    LedgerError::DuplicateSequence { .. } => LedgerError::DuplicateLine {
                        line: index + 1,
                        icv,
                    },
                    other => other,
                })?;
            }
        }
        tracing::debug!(path = %path.display(), entries = cache.entries.len(), "opened ndjson ledger");
        Ok(Self {
            path,
            cache,
            unterminated,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn ends_with_newline(path: &Path) -> Result<bool, LedgerError> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

impl LedgerStore for NdjsonLedgerStore {
    fn max_sequence(&self) -> Result<Option<u64>, LedgerError> {
        self.cache.max_sequence()
    }

    fn entry(&self, icv: u64) -> Result<Option<HashChainEntry>, LedgerError> {
        self.cache.entry(icv)
    }

    fn append(&mut self, entry: HashChainEntry) -> Result<(), LedgerError> {
        if self.cache.entries.contains_key(&entry.icv) {
            return Err(LedgerError::DuplicateSequence { icv: entry.icv });
        }
        let json = serde_json::to_string(&entry).map_err(|e| LedgerError::Store(e.to_string()))?;
        let mut line = String::with_capacity(json.len() + 2);
        if self.unterminated {
            line.push('\n');
        }
        line.push_str(&json);
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_all()?;
        self.unterminated = false;
        self.cache.append(entry)
    }

    fn entries(&self) -> Result<Vec<HashChainEntry>, LedgerError> {
        self.cache.entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(icv: u64, hash: &str, previous_hash: &str) -> HashChainEntry {
        HashChainEntry {
            icv,
            hash: hash.into(),
            previous_hash: previous_hash.into(),
        }
    }

    #[test]
    fn memory_store_orders_by_icv() {
        let mut store = MemoryLedgerStore::default();
        assert_eq!(store.max_sequence().expect("max"), None);
        store.append(entry(2, "b", "a")).expect("append");
        store.append(entry(1, "a", "0")).expect("append");
        assert_eq!(store.max_sequence().expect("max"), Some(2));
        let icvs: Vec<u64> = store.entries().expect("entries").iter().map(|e| e.icv).collect();
        assert_eq!(icvs, vec![1, 2]);
    }

    #[test]
    fn ndjson_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chain.ndjson");
        {
            let mut store = NdjsonLedgerStore::open(&path).expect("open");
            store.append(entry(1, "a", "0")).expect("append");
            store.append(entry(2, "b", "a")).expect("append");
        }
        let reopened = NdjsonLedgerStore::open(&path).expect("reopen");
        assert_eq!(reopened.max_sequence().expect("max"), Some(2));
        assert_eq!(reopened.entry(2).expect("entry"), Some(entry(2, "b", "a")));
        let text = std::fs::read_to_string(&path).expect("read");
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with(r#"{"icv":1,"hash":"a","previous_hash":"0"}"#));
    }

    #[test]
    fn memory_store_refuses_to_overwrite() {
        let mut store = MemoryLedgerStore::default();
        store.append(entry(1, "a", "0")).expect("append");
        assert!(matches!(
            store.append(entry(1, "evil", "0")),
            Err(LedgerError::DuplicateSequence { icv: 1 })
        ));
        assert_eq!(store.entry(1).expect("entry"), Some(entry(1, "a", "0")));
        assert!(matches!(
            MemoryLedgerStore::from_entries([entry(1, "a", "0"), entry(1, "b", "0")]),
            Err(LedgerError::DuplicateSequence { icv: 1 })
        ));
    }

    #[test]
    fn repeated_icv_on_disk_is_reported_with_its_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chain.ndjson");
        std::fs::write(
            &path,
            "{\"icv\":1,\"hash\":\"h1\",\"previous_hash\":\"0\"}\n\
             {\"icv\":2,\"hash\":\"h2\",\"previous_hash\":\"h1\"}\n\
             {\"icv\":2,\"hash\":\"evil\",\"previous_hash\":\"h1\"}\n\
             {\"icv\":3,\"hash\":\"h3\",\"previous_hash\":\"evil\"}\n",
        )
        .expect("write");
        let err = NdjsonLedgerStore::open(&path).expect_err("duplicate");
        assert!(matches!(err, LedgerError::DuplicateLine { line: 3, icv: 2 }));
    }

    #[test]
    fn append_after_unterminated_last_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chain.ndjson");
        std::fs::write(&path, r#"{"icv":1,"hash":"a","previous_hash":"0"}"#).expect("write");
        {
            let mut store = NdjsonLedgerStore::open(&path).expect("open");
            store.append(entry(2, "b", "a")).expect("append");
            store.append(entry(3, "c", "b")).expect("append");
        }
        let reopened = NdjsonLedgerStore::open(&path).expect("reopen");
        let icvs: Vec<u64> = reopened.entries().expect("entries").iter().map(|e| e.icv).collect();
        assert_eq!(icvs, vec![1, 2, 3]);
        let text = std::fs::read_to_string(&path).expect("read");
        assert_eq!(text.lines().count(), 3);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn corrupt_line_is_reported_with_its_number() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chain.ndjson");
        std::fs::write(&path, "{\"icv\":1,\"hash\":\"a\",\"previous_hash\":\"0\"}\n\nnot json\n")
            .expect("write");
        let err = NdjsonLedgerStore::open(&path).expect_err("corrupt");
        assert!(matches!(err, LedgerError::Corrupt { line: 3, .. }));
    }
}

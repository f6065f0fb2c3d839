use anyhow::{Context, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Newline-delimited address lists.
pub trait RecipientStore: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<String>>;
    fn save(&self, path: &Path, addresses: &[String]) -> Result<()>;
}

pub struct FileRecipientStore;

impl RecipientStore for FileRecipientStore {
    /// A missing file reads as an empty list.
    fn load(&self, path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read address file: {:?}", path))?;
        Ok(contents
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty())
            .collect())
    }

    fn save(&self, path: &Path, addresses: &[String]) -> Result<()> {
        fs::write(path, dedup(addresses).join("\n"))
            .with_context(|| format!("Failed to write address file: {:?}", path))
    }
}

fn dedup(addresses: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    addresses
        .iter()
        .filter(|address| seen.insert(address.as_str()))
        .cloned()
        .collect()
}

/// Per-account record files.
#[derive(Debug, Clone)]
pub struct RecipientFiles {
    pub source: PathBuf,
    pub sent: PathBuf,
    pub pending: PathBuf,
}

impl RecipientFiles {
    pub fn for_account(source: &Path, data_dir: &Path, file_tag: &str) -> Self {
        Self {
            source: source.to_path_buf(),
            sent: data_dir.join(format!("sent_{}.txt", file_tag)),
            pending: data_dir.join(format!("pending_{}.txt", file_tag)),
        }
    }
}

/// One day's recipient queue together with the sent and pending records it updates.
#[derive(Debug)]
pub struct RecipientLedger {
    queue: VecDeque<String>,
    sent: Vec<String>,
    pending: Vec<String>,
    files: RecipientFiles,
}

impl RecipientLedger {
    /// Reload every list and rebuild a shuffled queue of addresses that were
    /// never paid or are still pending from an earlier failure.
    pub fn load<R: Rng + ?Sized>(
        store: &dyn RecipientStore,
        files: RecipientFiles,
        rng: &mut R,
    ) -> Result<Self> {
        let all = store.load(&files.source)?;
        if all.is_empty() {
            info!("No recipient addresses found in {:?}", files.source);
        } else {
            info!("Using address list from file: {:?}", files.source);
        }
        let sent = store.load(&files.sent)?;
        let pending = store.load(&files.pending)?;
        Ok(Self::build(all, sent, pending, files, rng))
    }

    pub fn build<R: Rng + ?Sized>(
        mut all: Vec<String>,
        sent: Vec<String>,
        pending: Vec<String>,
        files: RecipientFiles,
        rng: &mut R,
    ) -> Self {
        all.shuffle(rng);
        let sent_set: HashSet<&str> = sent.iter().map(String::as_str).collect();
        let pending_set: HashSet<&str> = pending.iter().map(String::as_str).collect();
        let mut queued = HashSet::new();
        let queue = all
            .iter()
            .filter(|a| !sent_set.contains(a.as_str()) || pending_set.contains(a.as_str()))
            .filter(|a| queued.insert(a.as_str()))
            .cloned()
            .collect();
        Self {
            queue,
            sent,
            pending,
            files,
        }
    }

    pub fn next(&self) -> Option<&str> {
        self.queue.front().map(String::as_str)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn queue(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(String::as_str)
    }

    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    /// Move the head of the queue to the sent record and persist it.
    pub fn mark_sent(&mut self, store: &dyn RecipientStore) -> Result<Option<String>> {
        let Some(address) = self.queue.pop_front() else {
            return Ok(None);
        };
        self.sent.push(address.clone());
        store.save(&self.files.sent, &self.sent)?;
        if self.pending.contains(&address) {
            self.pending.retain(|a| a != &address);
            store.save(&self.files.pending, &self.pending)?;
        }
        Ok(Some(address))
    }

    /// Move the head of the queue to the pending record and persist it.
    pub fn mark_failed(&mut self, store: &dyn RecipientStore) -> Result<Option<String>> {
        let Some(address) = self.queue.pop_front() else {
            return Ok(None);
        };
        self.pending.push(address.clone());
        store.save(&self.files.pending, &self.pending)?;
        Ok(Some(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::TempDir;

    fn files(dir: &TempDir) -> RecipientFiles {
        RecipientFiles::for_account(&dir.path().join("list address.txt"), dir.path(), "Account_1")
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_load_normalizes_and_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.txt");
        assert!(FileRecipientStore.load(&path).unwrap().is_empty());

        fs::write(&path, "  0xABC \n\n0xdef\r\n").unwrap();
        assert_eq!(FileRecipientStore.load(&path).unwrap(), strings(&["0xabc", "0xdef"]));
    }

    #[test]
    fn test_save_dedups_preserving_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sent.txt");
        FileRecipientStore
            .save(&path, &strings(&["b", "a", "b", "c", "a"]))
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "b\na\nc");
    }

    #[test]
    fn test_build_excludes_sent_unless_pending() {
        let dir = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let ledger = RecipientLedger::build(
            strings(&["a", "b", "c", "d"]),
            strings(&["a", "b"]),
            strings(&["b"]),
            files(&dir),
            &mut rng,
        );

        let mut queued: Vec<&str> = ledger.queue().collect();
        queued.sort();
        assert_eq!(queued, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_success_moves_head_to_sent_file() {
        let dir = TempDir::new().unwrap();
        let files = files(&dir);
        let mut ledger = RecipientLedger {
            queue: VecDeque::from(strings(&["a", "b"])),
            sent: Vec::new(),
            pending: Vec::new(),
            files: files.clone(),
        };

        assert_eq!(ledger.mark_sent(&FileRecipientStore).unwrap(), Some("a".to_string()));

        assert_eq!(ledger.queue().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(FileRecipientStore.load(&files.sent).unwrap(), strings(&["a"]));
        assert!(!files.pending.exists());
    }

    #[test]
    fn test_failure_moves_head_to_pending_file() {
        let dir = TempDir::new().unwrap();
        let files = files(&dir);
        let mut ledger = RecipientLedger {
            queue: VecDeque::from(strings(&["a", "b"])),
            sent: Vec::new(),
            pending: Vec::new(),
            files: files.clone(),
        };

        ledger.mark_failed(&FileRecipientStore).unwrap();

        assert_eq!(ledger.queue().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(FileRecipientStore.load(&files.pending).unwrap(), strings(&["a"]));
        assert!(!files.sent.exists());
    }

    #[test]
    fn test_retried_pending_success_clears_pending_record() {
        let dir = TempDir::new().unwrap();
        let files = files(&dir);
        let mut ledger = RecipientLedger {
            queue: VecDeque::from(strings(&["a"])),
            sent: strings(&["a"]),
            pending: strings(&["a", "z"]),
            files: files.clone(),
        };

        ledger.mark_sent(&FileRecipientStore).unwrap();

        assert_eq!(FileRecipientStore.load(&files.sent).unwrap(), strings(&["a"]));
        assert_eq!(FileRecipientStore.load(&files.pending).unwrap(), strings(&["z"]));
        assert_eq!(ledger.mark_sent(&FileRecipientStore).unwrap(), None);
    }

    #[test]
    fn test_load_reads_all_three_files() {
        let dir = TempDir::new().unwrap();
        let files = files(&dir);
        fs::write(&files.source, "0xA\n0xB\n0xC").unwrap();
        fs::write(&files.sent, "0xa").unwrap();
        let mut rng = StdRng::seed_from_u64(2);

        let ledger = RecipientLedger::load(&FileRecipientStore, files, &mut rng).unwrap();

        assert_eq!(ledger.remaining(), 2);
        assert_eq!(ledger.sent(), strings(&["0xa"]).as_slice());
        assert!(ledger.pending().is_empty());
        assert!(ledger.next().is_some());
    }
}

//! Persistent record of broadcast transactions, so that confirmation
//! tracking can be resumed after a restart.

use core::str::FromStr;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_derive::{Deserialize, Serialize};
use tendermint::Hash as TxHash;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::error::Error;
use crate::lifecycle::TxLifecycleState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub signer: String,
    /// Seconds since the Unix epoch.
    pub submitted_at: u64,
    pub state: TxLifecycleState,
}

/// JSON file mapping upper-case hex transaction hashes to [`JournalEntry`].
///
/// Updates are applied in memory right away. Inside a tokio runtime the file
/// is rewritten on the blocking pool, through a temporary file renamed over
/// the previous one; a write never replaces a newer snapshot. Use
/// [`TxJournal::flush`] to wait for the latest state to reach the disk.
///
/// Entries that reached a terminal state are dropped when the journal is
/// opened again.
#[derive(Debug)]
pub struct TxJournal {
    path: PathBuf,
    entries: Mutex<Entries>,
    /// Version of the snapshot currently on disk.
    written: Arc<Mutex<u64>>,
}

#[derive(Debug, Default)]
struct Entries {
    by_hash: BTreeMap<String, JournalEntry>,
    version: u64,
}

impl TxJournal {
    /// Open the journal at `path`, starting empty if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        let mut by_hash: BTreeMap<String, JournalEntry> = if path.exists() {
            let content = fs::read_to_string(&path).map_err(Error::io)?;

            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)
                    .map_err(|e| Error::json("transaction journal".to_string(), e))?
            }
        } else {
            BTreeMap::new()
        };

        let stored = by_hash.len();
        by_hash.retain(|_, entry| !entry.state.is_terminal());

        debug!(
            path = %path.display(),
            entries = by_hash.len(),
            dropped = stored - by_hash.len(),
            "opened transaction journal"
        );

        Ok(Self {
            path,
            entries: Mutex::new(Entries {
                by_hash,
                version: 0,
            }),
            written: Arc::new(Mutex::new(0)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_submitted(&self, hash: TxHash, signer: &str) -> Result<(), Error> {
        let submitted_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let (version, content) = {
            let mut entries = self.lock();

            entries.by_hash.insert(
                hash.to_string(),
                JournalEntry {
                    signer: signer.to_string(),
                    submitted_at,
                    state: TxLifecycleState::Submitted,
                },
            );

            entries.bump()?
        };

        self.schedule_write(version, content)
    }

    /// Update the state of a journaled hash. Unknown hashes are ignored.
    pub fn update_state(&self, hash: TxHash, state: TxLifecycleState) -> Result<(), Error> {
        let (version, content) = {
            let mut entries = self.lock();

            match entries.by_hash.get_mut(&hash.to_string()) {
                Some(entry) if entry.state != state => entry.state = state,
                _ => return Ok(()),
            }

            entries.bump()?
        };

        self.schedule_write(version, content)
    }

    pub fn get(&self, hash: &TxHash) -> Option<JournalEntry> {
        self.lock().by_hash.get(&hash.to_string()).cloned()
    }

    /// Entries whose transaction has not reached a terminal state.
    pub fn pending(&self) -> Vec<(TxHash, JournalEntry)> {
        self.lock()
            .by_hash
            .iter()
            .filter(|(_, entry)| !entry.state.is_terminal())
            .filter_map(|(hash, entry)| match TxHash::from_str(hash) {
                Ok(hash) => Some((hash, entry.clone())),
                Err(e) => {
                    warn!(%hash, "skipping journal entry with an invalid hash: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn entries(&self) -> BTreeMap<String, JournalEntry> {
        self.lock().by_hash.clone()
    }

    /// Wait until the current in-memory state is on disk.
    pub async fn flush(&self) -> Result<(), Error> {
        let (version, content) = {
            let entries = self.lock();
            (entries.version, entries.serialize()?)
        };

        let path = self.path.clone();
        let written = self.written.clone();

        tokio::task::spawn_blocking(move || write_snapshot(&path, &written, version, &content))
            .await
            .map_err(Error::journal_task)?
    }

    fn schedule_write(&self, version: u64, content: String) -> Result<(), Error> {
        let Ok(runtime) = Handle::try_current() else {
            return write_snapshot(&self.path, &self.written, version, &content);
        };

        let path = self.path.clone();
        let written = self.written.clone();

        runtime.spawn_blocking(move || {
            if let Err(e) = write_snapshot(&path, &written, version, &content) {
                warn!(path = %path.display(), "failed to write transaction journal: {}", e);
            }
        });

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Entries {
    /// Register a change and snapshot the result.
    fn bump(&mut self) -> Result<(u64, String), Error> {
        self.version += 1;
        Ok((self.version, self.serialize()?))
    }

    fn serialize(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(&self.by_hash)
            .map_err(|e| Error::json("transaction journal".to_string(), e))
    }
}

fn write_snapshot(path: &Path, written: &Mutex<u64>, version: u64, content: &str) -> Result<(), Error> {
    let mut on_disk = written.lock().unwrap_or_else(PoisonError::into_inner);

    if *on_disk >= version {
        return Ok(());
    }

    let tmp_path = path.with_extension("tmp");

    fs::write(&tmp_path, content).map_err(Error::io)?;
    fs::rename(&tmp_path, path).map_err(Error::io)?;

    *on_disk = version;

    Ok(())
}

use crate::error::StoreError;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Telegram chat identity of a subscriber.
pub type ChatId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    AlreadySubscribed,
}

/// Line-delimited subscriber file, one decimal chat id per line.
///
/// All file access goes through `known`, so appends from the subscription
/// watcher never interleave with reads from the block watcher.
pub struct SubscriberStore {
    path: PathBuf,
    known: Mutex<HashSet<ChatId>>,
}

impl SubscriberStore {
    /// Open the store and rebuild the in-memory index from the file.
    /// A missing file is a valid empty store and is created on first append.
    ///
    /// A corrupt line does not prevent startup: the index starts empty and is
    /// rebuilt by the first `list_all` that reads the file cleanly.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let ids = match read_ids(&path).await {
            Ok(ids) => ids,
            Err(e @ StoreError::Parse { .. }) => {
                tracing::error!(
                    "Subscriber file {} is corrupt, starting with an empty index: {e}",
                    path.display()
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        terminate_last_line(&path).await?;

        tracing::info!(
            "Loaded {} subscribers from {}",
            ids.len(),
            path.display()
        );

        Ok(Self {
            path,
            known: Mutex::new(ids.into_iter().collect()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a new subscriber. Ids already present are not written twice.
    pub async fn append(&self, id: ChatId) -> Result<Registration, StoreError> {
        let mut known = self.known.lock().await;
        if known.contains(&id) {
            return Ok(Registration::AlreadySubscribed);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{id}\n").as_bytes()).await?;
        file.flush().await?;

        known.insert(id);
        Ok(Registration::Added)
    }

    /// Read every subscriber from disk, in file order.
    ///
    /// Fails on the first line that is not a valid id; no partial list is returned.
    pub async fn list_all(&self) -> Result<Vec<ChatId>, StoreError> {
        let mut known = self.known.lock().await;
        let ids = read_ids(&self.path).await?;
        *known = ids.iter().copied().collect();
        Ok(ids)
    }
}

async fn read_ids(path: &Path) -> Result<Vec<ChatId>, StoreError> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("No subscriber file at {} yet", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    if content.is_empty() {
        return Ok(Vec::new());
    }

    // Bytes, not a String: a line with invalid UTF-8 is a corrupt id, not an IO failure.
    let body = content.strip_suffix(b"\n").unwrap_or(&content);
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for (idx, line) in body.split(|b| *b == b'\n').enumerate() {
        let id: ChatId = std::str::from_utf8(line)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| StoreError::Parse {
                line: idx + 1,
                value: String::from_utf8_lossy(line).into_owned(),
            })?;
        // Files written before deduplication may repeat ids.
        if seen.insert(id) {
            ids.push(id);
        }
    }

    Ok(ids)
}

// A hand-edited file may lack the final newline; fix it so the next append
// does not merge into the last id.
async fn terminate_last_line(path: &Path) -> Result<(), StoreError> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    if content.last().is_some_and(|b| *b != b'\n') {
        let mut file = OpenOptions::new().append(true).open(path).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
    }
    Ok(())
}

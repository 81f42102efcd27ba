use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{BotError, Result};

/// Persistent set of blocked user ids, stored as a JSON array of strings.
///
/// Every mutation rewrites the file while the set lock is held, so the
/// in-memory set and the file never disagree across a restart.
pub struct BlockStore {
    path: PathBuf,
    blocked: Mutex<HashSet<String>>,
}

impl BlockStore {
    /// Load the block list, falling back to an empty set if the file is
    /// missing or unreadable
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let blocked = match read_block_list(&path).await {
            Ok(set) => {
                info!(
                    "Loaded {} blocked user(s) from {}",
                    set.len(),
                    path.display()
                );
                set
            }
            Err(e) => {
                warn!("Could not load block list: {}, using empty list", e);
                HashSet::new()
            }
        };

        Self {
            path,
            blocked: Mutex::new(blocked),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block a user. Idempotent; always reports success.
    pub async fn block(&self, user_id: &str) -> bool {
        let mut blocked = self.blocked.lock().await;
        blocked.insert(user_id.to_string());
        if let Err(e) = self.save(&blocked).await {
            error!("Failed to persist block of {}: {}", user_id, e);
        }
        info!("Blocked user {}", user_id);
        true
    }

    /// Unblock a user, returning whether they were blocked. The file is
    /// only rewritten when something changed.
    pub async fn unblock(&self, user_id: &str) -> bool {
        let mut blocked = self.blocked.lock().await;
        if !blocked.remove(user_id) {
            debug!("Unblock requested for {} who is not blocked", user_id);
            return false;
        }
        if let Err(e) = self.save(&blocked).await {
            error!("Failed to persist unblock of {}: {}", user_id, e);
        }
        info!("Unblocked user {}", user_id);
        true
    }

    pub async fn is_blocked(&self, user_id: &str) -> bool {
        self.blocked.lock().await.contains(user_id)
    }

    /// Snapshot of all blocked ids, sorted
    pub async fn blocked_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.blocked.lock().await.iter().cloned().collect();
        users.sort();
        users
    }

    /// Write the whole set via a temp file and rename
    async fn save(&self, blocked: &HashSet<String>) -> Result<()> {
        let mut users: Vec<&String> = blocked.iter().collect();
        users.sort();
        let content = serde_json::to_string(&users)?;

        let path = self.path.display().to_string();
        let temp_path = format!("{}.tmp", path);
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| BotError::StateSave {
                path: path.clone(),
                source: e,
            })?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| BotError::StateSave { path, source: e })?;

        Ok(())
    }
}

async fn read_block_list(path: &Path) -> Result<HashSet<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let users: Vec<String> =
                serde_json::from_str(&content).map_err(|e| BotError::StateParse {
                    path: path.display().to_string(),
                    source: e,
                })?;
            Ok(users.into_iter().collect())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
        Err(e) => Err(BotError::StateLoad {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

/// Shared block store type
pub type SharedBlockStore = Arc<BlockStore>;

pub async fn create_shared_block_store(path: impl Into<PathBuf>) -> SharedBlockStore {
    Arc::new(BlockStore::load(path).await)
}

use std::collections::HashSet;

use crate::error::{BotError, Result};
use crate::telegram::UserId;

/// Privileged user ids, fixed for the process lifetime
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminIdentitySet {
    ids: HashSet<UserId>,
}

impl AdminIdentitySet {
    pub fn new(ids: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Parse a comma-separated id list such as `"123, 456"`
    pub fn parse(key: &str, raw: &str) -> Result<Self> {
        let mut ids = HashSet::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let id = part
                .parse::<u64>()
                .map(UserId)
                .map_err(|_| BotError::invalid(key, format!("'{}' is not a user id", part)))?;
            ids.insert(id);
        }

        if ids.is_empty() {
            return Err(BotError::missing(key));
        }
        Ok(Self { ids })
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.ids.contains(&user_id)
    }

    /// Admin ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = UserId> {
        let mut ids: Vec<UserId> = self.ids.iter().copied().collect();
        ids.sort_by_key(|id| id.0);
        ids.into_iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

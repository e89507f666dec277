// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! On-device key-value storage for the schedule mirror.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

/// Local storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Asynchronous string key-value store.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Key names. Everything except `LAST_OWNER` is partitioned by user.
pub mod keys {
    /// UID that owns the current mirror contents.
    pub const LAST_OWNER: &str = "last_owner";

    /// JSON array of activities.
    pub fn schedule(uid: &str) -> String {
        format!("schedule_{}", uid)
    }

    /// Last successful remote refresh, epoch seconds.
    pub fn last_fetch(uid: &str) -> String {
        format!("last_fetch_{}", uid)
    }

    /// Highest `created` watermark seen, epoch milliseconds.
    pub fn most_recent_created(uid: &str) -> String {
        format!("most_recent_created_{}", uid)
    }

    /// All keys owned by `uid`.
    pub fn user_scoped(uid: &str) -> [String; 3] {
        [schedule(uid), last_fetch(uid), most_recent_created(uid)]
    }
}

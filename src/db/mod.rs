//! Remote activity source (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

use crate::error::AppError;
use crate::models::{Activity, ValidDraft};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    pub const ACTIVITIES: &str = "activities";
}

/// Queryable collection of activity documents.
///
/// Implementations own the `created` watermark: it comes from the server's
/// clock, is assigned on `add` and re-stamped on every other owner write, so
/// `fetch_since` sees edits made on any device.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Activities of `owner_id` with `created > after`, ascending by `created`.
    async fn fetch_since(
        &self,
        owner_id: &str,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Activity>, AppError>;

    async fn get(&self, id: &str) -> Result<Option<Activity>, AppError>;

    /// Store a new activity; assigns `id` and `created`.
    async fn add(&self, owner_id: &str, draft: ValidDraft) -> Result<Activity, AppError>;

    /// Overwrite the editable fields of an existing activity; re-stamps
    /// `created`. `owner_id` and `removed` keep their stored values.
    async fn update(&self, activity: Activity) -> Result<Activity, AppError>;

    async fn delete(&self, id: &str) -> Result<(), AppError>;

    /// Soft delete; re-stamps `created` so other devices pick up the removal.
    async fn mark_removed(&self, id: &str) -> Result<Activity, AppError>;
}

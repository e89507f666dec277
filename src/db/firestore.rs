// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing the remote activity source.

use crate::db::{collections, ActivitySource};
use crate::error::AppError;
use crate::models::{Activity, MeetingTarget, ValidDraft};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::{
    FirestoreTimestamp, FirestoreTransaction, FirestoreTransformServerValue,
    FirestoreWritePrecondition,
};
use serde::{Deserialize, Serialize};

/// Fields an owner edit may change. `owner_id` and `removed` are never
/// rewritten by `update`, so an edit cannot revive a cancelled booking.
const EDITABLE_FIELDS: [&str; 6] = [
    "title",
    "start_time",
    "end_time",
    "meeting_targets",
    "send_confirm",
    "description",
];

/// Stored shape of an activity. Identical to `Activity` except that
/// `created` is a native Firestore timestamp set from the server's request
/// time on every write, so watermarks never depend on a device clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActivityDoc {
    id: String,
    title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    end_time: DateTime<Utc>,
    #[serde(default)]
    meeting_targets: Vec<MeetingTarget>,
    #[serde(default)]
    send_confirm: bool,
    #[serde(default)]
    description: String,
    owner_id: String,
    #[serde(with = "firestore::serialize_as_timestamp")]
    created: DateTime<Utc>,
    #[serde(default)]
    removed: bool,
}

impl From<Activity> for ActivityDoc {
    fn from(a: Activity) -> Self {
        Self {
            id: a.id,
            title: a.title,
            start_time: a.start_time,
            end_time: a.end_time,
            meeting_targets: a.meeting_targets,
            send_confirm: a.send_confirm,
            description: a.description,
            owner_id: a.owner_id,
            created: a.created,
            removed: a.removed,
        }
    }
}

impl From<ActivityDoc> for Activity {
    fn from(d: ActivityDoc) -> Self {
        Self {
            id: d.id,
            title: d.title,
            start_time: d.start_time,
            end_time: d.end_time,
            meeting_targets: d.meeting_targets,
            send_confirm: d.send_confirm,
            description: d.description,
            owner_id: d.owner_id,
            created: d.created,
            removed: d.removed,
        }
    }
}

/// Partial document written by `mark_removed`.
#[derive(Serialize, Deserialize)]
struct RemovedFlag {
    removed: bool,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn begin(&self) -> Result<FirestoreTransaction<'_>, AppError> {
        self.get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))
    }

    async fn commit(transaction: FirestoreTransaction<'_>) -> Result<(), AppError> {
        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(())
    }

    /// Read back a document after a write, with the server-assigned `created`.
    async fn load_written(&self, id: &str) -> Result<Activity, AppError> {
        self.get(id)
            .await?
            .ok_or_else(|| AppError::Database(format!("Activity {} missing after write", id)))
    }
}

#[async_trait]
impl ActivitySource for FirestoreDb {
    async fn fetch_since(
        &self,
        owner_id: &str,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Activity>, AppError> {
        let owner_id = owner_id.to_string();
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES);

        let query = if let Some(cursor) = after {
            query.filter(move |q| {
                q.for_all([
                    q.field("owner_id").eq(owner_id.clone()),
                    q.field("created").greater_than(FirestoreTimestamp(cursor)),
                ])
            })
        } else {
            query.filter(move |q| q.field("owner_id").eq(owner_id.clone()))
        };

        let docs: Vec<ActivityDoc> = query
            .order_by([("created", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(docs.into_iter().map(Activity::from).collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Activity>, AppError> {
        let doc: Option<ActivityDoc> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(doc.map(Activity::from))
    }

    async fn add(&self, owner_id: &str, draft: ValidDraft) -> Result<Activity, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        // `created` is overwritten by the server timestamp transform on commit
        let doc = ActivityDoc::from(draft.into_activity(
            id.clone(),
            owner_id.to_string(),
            DateTime::UNIX_EPOCH,
        ));

        let mut transaction = self.begin().await?;
        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(&id)
            .object(&doc)
            .transforms(|t| {
                t.fields([t
                    .field("created")
                    .server_value(FirestoreTransformServerValue::RequestTime)])
            })
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add activity to transaction: {}", e))
            })?;
        Self::commit(transaction).await?;

        let stored = self.load_written(&id).await?;
        tracing::info!(activity_id = %stored.id, owner_id, "Activity created");
        Ok(stored)
    }

    async fn update(&self, activity: Activity) -> Result<Activity, AppError> {
        let id = activity.id.clone();
        let doc = ActivityDoc::from(activity);

        let mut transaction = self.begin().await?;
        self.get_client()?
            .fluent()
            .update()
            .fields(EDITABLE_FIELDS)
            .in_col(collections::ACTIVITIES)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(&id)
            .object(&doc)
            .transforms(|t| {
                t.fields([t
                    .field("created")
                    .server_value(FirestoreTransformServerValue::RequestTime)])
            })
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add update to transaction: {}", e))
            })?;
        Self::commit(transaction).await?;

        let stored = self.load_written(&id).await?;
        tracing::debug!(activity_id = %stored.id, "Activity updated");
        Ok(stored)
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::ACTIVITIES)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(activity_id = id, "Activity deleted");
        Ok(())
    }

    async fn mark_removed(&self, id: &str) -> Result<Activity, AppError> {
        if self.get(id).await?.is_none() {
            return Err(AppError::NotFound(format!("Activity {}", id)));
        }

        // Only `removed` and `created` are written, so a concurrent edit from
        // another device is neither lost nor able to undo the removal.
        let mut transaction = self.begin().await?;
        self.get_client()?
            .fluent()
            .update()
            .fields(["removed"])
            .in_col(collections::ACTIVITIES)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(id)
            .object(&RemovedFlag { removed: true })
            .transforms(|t| {
                t.fields([t
                    .field("created")
                    .server_value(FirestoreTransformServerValue::RequestTime)])
            })
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add removal to transaction: {}", e))
            })?;
        Self::commit(transaction).await?;

        let stored = self.load_written(id).await?;
        tracing::info!(activity_id = id, "Activity marked removed");
        Ok(stored)
    }
}

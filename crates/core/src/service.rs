//! History orchestration.
//!
//! [`HistoryService`] is the only entry point that combines identity,
//! normalization, and storage. All collaborators are constructor-injected;
//! there are no ambient singletons, so tests can substitute any of them.
//!
//! A single submission moves through:
//! `Received -> Normalizing -> {Normalized, PartiallyNormalized, Unparseable}
//! -> Persisting -> {Persisted, PersistDeferredWarning}`.
//! Both terminal states return the normalized result to the caller; only the
//! latter additionally carries a non-blocking warning. Losing history is
//! acceptable; losing a computed answer the user is waiting on is not.

use crate::config::CoreConfig;
use crate::entry::{KindStats, NewEntry, QueryKind, StoredEntry};
use crate::error::{HistoryError, HistoryResult};
use crate::normalize::{normalize, NormalizeStatus, NormalizedResult};
use crate::store::HistoryStore;
use crate::user::UserContext;
use medilingua_types::NonEmptyText;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Warning attached to a record outcome when persistence was skipped.
pub const PERSIST_WARNING: &str =
    "could not save to history, but the result was generated successfully";

/// Result of recording a submission.
///
/// `entry` is `None` exactly when `warning` is `Some`: the primary result
/// survived but history persistence did not.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub result: NormalizedResult,
    pub status: NormalizeStatus,
    pub entry: Option<StoredEntry>,
    pub warning: Option<String>,
}

/// A user's history split by kind, each sequence independently ordered
/// newest-first. This split shape is the canonical list view.
#[derive(Debug, Clone, Default)]
pub struct GroupedHistory {
    pub terms: Vec<StoredEntry>,
    pub reports: Vec<StoredEntry>,
}

/// Orchestrates identity resolution, normalization, and storage.
pub struct HistoryService {
    cfg: Arc<CoreConfig>,
    store: Arc<dyn HistoryStore>,
    users: Arc<dyn UserContext>,
}

impl HistoryService {
    pub fn new(
        cfg: Arc<CoreConfig>,
        store: Arc<dyn HistoryStore>,
        users: Arc<dyn UserContext>,
    ) -> Self {
        Self { cfg, store, users }
    }

    /// Bound a storage operation with the configured timeout; an elapsed
    /// timeout is indistinguishable from unavailable storage to the caller.
    async fn bounded<T>(
        &self,
        operation: impl Future<Output = HistoryResult<T>>,
    ) -> HistoryResult<T> {
        match tokio::time::timeout(self.cfg.storage_timeout(), operation).await {
            Ok(result) => result,
            Err(_) => Err(HistoryError::StorageUnavailable(format!(
                "storage operation timed out after {:?}",
                self.cfg.storage_timeout()
            ))),
        }
    }

    /// Normalize and persist one submission.
    ///
    /// Normalization never blocks persistence: even an `Unparseable` result
    /// is stored, tagged, so the user's original input is never silently
    /// lost. A storage failure degrades to a warning on an otherwise
    /// successful outcome.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` if the credential cannot be resolved;
    /// `InvalidInput` if the submitted text is empty or whitespace-only.
    /// Storage failures do not surface as errors here.
    pub async fn record(
        &self,
        credential: &str,
        kind: QueryKind,
        original_input: &str,
        raw_result: &Value,
    ) -> HistoryResult<RecordOutcome> {
        let user_id = self.users.verify(credential).await?;
        let original_input = NonEmptyText::new(original_input).map_err(|_| {
            HistoryError::InvalidInput("submitted text cannot be empty".into())
        })?;

        let (result, status) = normalize(kind, raw_result);
        if status != NormalizeStatus::Ok {
            tracing::warn!(
                "degraded normalization: user={} kind={} status={}",
                user_id,
                kind.as_str(),
                status.as_str()
            );
        }

        let entry = NewEntry {
            user_id: user_id.clone(),
            kind,
            original_input,
            result: result.clone(),
            status,
        };

        match self.bounded(self.store.append(entry)).await {
            Ok(stored) => Ok(RecordOutcome {
                result,
                status,
                entry: Some(stored),
                warning: None,
            }),
            Err(HistoryError::StorageUnavailable(reason)) => {
                tracing::warn!(
                    "history persistence deferred: user={} kind={} reason={}",
                    user_id,
                    kind.as_str(),
                    reason
                );
                Ok(RecordOutcome {
                    result,
                    status,
                    entry: None,
                    warning: Some(PERSIST_WARNING.to_owned()),
                })
            }
            Err(other) => Err(other),
        }
    }

    /// The user's history grouped by kind. With a kind filter only the
    /// matching group is populated.
    pub async fn list(
        &self,
        credential: &str,
        kind_filter: Option<QueryKind>,
    ) -> HistoryResult<GroupedHistory> {
        let user_id = self.users.verify(credential).await?;
        let entries = self
            .bounded(
                self.store
                    .list_by_user(&user_id, self.cfg.default_list_limit(), kind_filter),
            )
            .await?;

        let mut grouped = GroupedHistory::default();
        for entry in entries {
            match entry.kind {
                QueryKind::Term => grouped.terms.push(entry),
                QueryKind::Report => grouped.reports.push(entry),
            }
        }
        Ok(grouped)
    }

    /// Fetch one entry, ownership-checked.
    pub async fn get(&self, credential: &str, id: &str) -> HistoryResult<StoredEntry> {
        let user_id = self.users.verify(credential).await?;
        self.bounded(self.store.get_by_id(&user_id, id))
            .await?
            .ok_or(HistoryError::NotFound)
    }

    /// Delete one entry, ownership-checked.
    pub async fn remove(&self, credential: &str, id: &str) -> HistoryResult<()> {
        let user_id = self.users.verify(credential).await?;
        if self.bounded(self.store.delete_by_id(&user_id, id)).await? {
            Ok(())
        } else {
            Err(HistoryError::NotFound)
        }
    }

    /// Delete the user's whole history, returning the count removed.
    pub async fn clear(&self, credential: &str) -> HistoryResult<usize> {
        let user_id = self.users.verify(credential).await?;
        self.bounded(self.store.clear_for_user(&user_id)).await
    }

    /// Per-kind usage statistics.
    pub async fn stats(&self, credential: &str) -> HistoryResult<Vec<KindStats>> {
        let user_id = self.users.verify(credential).await?;
        self.bounded(self.store.stats_for_user(&user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryHistoryStore;
    use crate::user::SharedSecretUserContext;
    use medilingua_types::UserId;
    use serde_json::json;
    use std::time::Duration;

    /// Store double whose every operation fails as unavailable.
    struct UnavailableStore;

    #[async_trait::async_trait]
    impl HistoryStore for UnavailableStore {
        async fn append(&self, _entry: NewEntry) -> HistoryResult<StoredEntry> {
            Err(HistoryError::StorageUnavailable("connection refused".into()))
        }
        async fn list_by_user(
            &self,
            _user_id: &UserId,
            _limit: usize,
            _kind: Option<QueryKind>,
        ) -> HistoryResult<Vec<StoredEntry>> {
            Err(HistoryError::StorageUnavailable("connection refused".into()))
        }
        async fn get_by_id(
            &self,
            _user_id: &UserId,
            _id: &str,
        ) -> HistoryResult<Option<StoredEntry>> {
            Err(HistoryError::StorageUnavailable("connection refused".into()))
        }
        async fn delete_by_id(&self, _user_id: &UserId, _id: &str) -> HistoryResult<bool> {
            Err(HistoryError::StorageUnavailable("connection refused".into()))
        }
        async fn clear_for_user(&self, _user_id: &UserId) -> HistoryResult<usize> {
            Err(HistoryError::StorageUnavailable("connection refused".into()))
        }
        async fn stats_for_user(&self, _user_id: &UserId) -> HistoryResult<Vec<KindStats>> {
            Err(HistoryError::StorageUnavailable("connection refused".into()))
        }
    }

    /// Store double that hangs forever, to exercise the timeout bound.
    struct HangingStore;

    #[async_trait::async_trait]
    impl HistoryStore for HangingStore {
        async fn append(&self, _entry: NewEntry) -> HistoryResult<StoredEntry> {
            std::future::pending().await
        }
        async fn list_by_user(
            &self,
            _user_id: &UserId,
            _limit: usize,
            _kind: Option<QueryKind>,
        ) -> HistoryResult<Vec<StoredEntry>> {
            std::future::pending().await
        }
        async fn get_by_id(
            &self,
            _user_id: &UserId,
            _id: &str,
        ) -> HistoryResult<Option<StoredEntry>> {
            std::future::pending().await
        }
        async fn delete_by_id(&self, _user_id: &UserId, _id: &str) -> HistoryResult<bool> {
            std::future::pending().await
        }
        async fn clear_for_user(&self, _user_id: &UserId) -> HistoryResult<usize> {
            std::future::pending().await
        }
        async fn stats_for_user(&self, _user_id: &UserId) -> HistoryResult<Vec<KindStats>> {
            std::future::pending().await
        }
    }

    fn service_with(store: Arc<dyn HistoryStore>) -> HistoryService {
        let cfg = Arc::new(
            CoreConfig::new(
                std::path::PathBuf::from("/unused"),
                50,
                Duration::from_millis(200),
            )
            .unwrap(),
        );
        let users = Arc::new(SharedSecretUserContext::new("sekret").unwrap());
        HistoryService::new(cfg, store, users)
    }

    fn hypertension_raw() -> Value {
        json!({
            "explanation": "high blood pressure",
            "examples": ["blood pressure readings above 140/90"],
            "relatedTerms": ["bp"],
            "notes": ""
        })
    }

    #[tokio::test]
    async fn record_then_list_returns_entry_first_among_terms() {
        let service = service_with(Arc::new(MemoryHistoryStore::new()));

        let outcome = service
            .record("alice:sekret", QueryKind::Term, "hypertension", &hypertension_raw())
            .await
            .unwrap();

        assert!(outcome.warning.is_none());
        assert_eq!(outcome.status, NormalizeStatus::Ok);
        let stored = outcome.entry.expect("entry should be persisted");
        assert_eq!(stored.kind, QueryKind::Term);
        assert_eq!(stored.original_input.as_str(), "hypertension");
        let NormalizedResult::Term(term) = &stored.result else {
            panic!("expected term result");
        };
        assert_eq!(term.explanation, "high blood pressure");

        let grouped = service.list("alice:sekret", None).await.unwrap();
        assert_eq!(grouped.terms.first().map(|e| e.id.as_str()), Some(stored.id.as_str()));
        assert!(grouped.reports.is_empty());
    }

    #[tokio::test]
    async fn record_rejects_bad_credential_and_empty_input() {
        let service = service_with(Arc::new(MemoryHistoryStore::new()));

        let unauthenticated = service
            .record("alice:wrong", QueryKind::Term, "hypertension", &hypertension_raw())
            .await;
        assert!(matches!(unauthenticated, Err(HistoryError::Unauthenticated(_))));

        let invalid = service
            .record("alice:sekret", QueryKind::Term, "   ", &hypertension_raw())
            .await;
        assert!(matches!(invalid, Err(HistoryError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn unparseable_result_is_still_persisted_tagged() {
        let service = service_with(Arc::new(MemoryHistoryStore::new()));

        let outcome = service
            .record(
                "alice:sekret",
                QueryKind::Report,
                "CBC panel text",
                &json!("not json at all"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, NormalizeStatus::Unparseable);
        let stored = outcome.entry.expect("even unparseable results are stored");
        assert_eq!(stored.status, NormalizeStatus::Unparseable);
    }

    #[tokio::test]
    async fn storage_unavailable_degrades_to_warning() {
        let service = service_with(Arc::new(UnavailableStore));

        let outcome = service
            .record("alice:sekret", QueryKind::Report, "CBC panel text", &json!({
                "summary": "all clear",
                "keyPoints": [],
                "medicalTerms": [],
                "actions": [],
                "warnings": []
            }))
            .await
            .unwrap();

        assert!(outcome.entry.is_none());
        assert_eq!(outcome.warning.as_deref(), Some(PERSIST_WARNING));
        let NormalizedResult::Report(report) = &outcome.result else {
            panic!("expected report result");
        };
        assert_eq!(report.summary, "all clear");
    }

    #[tokio::test]
    async fn hanging_storage_times_out_into_warning() {
        let service = service_with(Arc::new(HangingStore));

        let outcome = service
            .record("alice:sekret", QueryKind::Term, "hypertension", &hypertension_raw())
            .await
            .unwrap();
        assert!(outcome.entry.is_none());
        assert!(outcome.warning.is_some());
    }

    #[tokio::test]
    async fn reads_surface_storage_unavailable_as_hard_error() {
        let service = service_with(Arc::new(UnavailableStore));
        let result = service.list("alice:sekret", None).await;
        assert!(matches!(result, Err(HistoryError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn list_splits_by_kind_and_filter_narrows() {
        let service = service_with(Arc::new(MemoryHistoryStore::new()));

        service
            .record("alice:sekret", QueryKind::Term, "hypertension", &hypertension_raw())
            .await
            .unwrap();
        service
            .record(
                "alice:sekret",
                QueryKind::Report,
                "CBC panel text",
                &json!({
                    "summary": "all clear",
                    "keyPoints": [],
                    "medicalTerms": [],
                    "actions": [],
                    "warnings": []
                }),
            )
            .await
            .unwrap();

        let grouped = service.list("alice:sekret", None).await.unwrap();
        assert_eq!(grouped.terms.len(), 1);
        assert_eq!(grouped.reports.len(), 1);

        let only_terms = service.list("alice:sekret", Some(QueryKind::Term)).await.unwrap();
        assert_eq!(only_terms.terms.len(), 1);
        assert!(only_terms.reports.is_empty());
    }

    #[tokio::test]
    async fn remove_and_get_map_misses_to_not_found() {
        let service = service_with(Arc::new(MemoryHistoryStore::new()));

        let outcome = service
            .record("alice:sekret", QueryKind::Term, "hypertension", &hypertension_raw())
            .await
            .unwrap();
        let id = outcome.entry.unwrap().id;

        // Another user cannot see or delete it.
        assert!(matches!(
            service.get("bob:sekret", &id).await,
            Err(HistoryError::NotFound)
        ));
        assert!(matches!(
            service.remove("bob:sekret", &id).await,
            Err(HistoryError::NotFound)
        ));

        service.remove("alice:sekret", &id).await.unwrap();
        assert!(matches!(
            service.remove("alice:sekret", &id).await,
            Err(HistoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn clear_reports_count() {
        let service = service_with(Arc::new(MemoryHistoryStore::new()));

        for term in ["hypertension", "stenosis"] {
            service
                .record("alice:sekret", QueryKind::Term, term, &hypertension_raw())
                .await
                .unwrap();
        }

        assert_eq!(service.clear("alice:sekret").await.unwrap(), 2);
        assert_eq!(service.clear("alice:sekret").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stats_are_authorization_checked() {
        let service = service_with(Arc::new(MemoryHistoryStore::new()));
        assert!(service.stats("alice:wrong").await.is_err());

        service
            .record("alice:sekret", QueryKind::Term, "hypertension", &hypertension_raw())
            .await
            .unwrap();
        let stats = service.stats("alice:sekret").await.unwrap();
        let terms = stats.iter().find(|s| s.kind == QueryKind::Term).unwrap();
        assert_eq!(terms.count, 1);
    }
}

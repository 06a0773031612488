use std::sync::Arc;

use pacer_core::time::Clock;
use storage::backup::BackupPayload;
use storage::repository::BackupRepository;

use crate::error::BackupError;

/// Whole-store export/import against the versioned JSON contract.
pub struct BackupService {
    backup: Arc<dyn BackupRepository>,
    clock: Clock,
}

impl BackupService {
    #[must_use]
    pub fn new(backup: Arc<dyn BackupRepository>, clock: Clock) -> Self {
        Self { backup, clock }
    }

    /// Export every collection as a versioned payload.
    ///
    /// # Errors
    ///
    /// Returns `BackupError::Storage` when rows cannot be read.
    pub async fn export(&self) -> Result<BackupPayload, BackupError> {
        let data = self.backup.export_all().await?;
        Ok(BackupPayload::new(self.clock.now(), data))
    }

    /// Export as a JSON string (the downloadable backup file).
    ///
    /// # Errors
    ///
    /// Returns `BackupError` for storage or serialization failures.
    pub async fn export_json(&self) -> Result<String, BackupError> {
        Ok(self.export().await?.to_json()?)
    }

    /// Import a payload: full destructive overwrite of all eight
    /// collections in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `BackupError::Storage` when the overwrite fails; nothing is
    /// partially applied.
    pub async fn import(&self, payload: &BackupPayload) -> Result<(), BackupError> {
        self.backup.import_all(&payload.data).await?;
        tracing::info!("backup imported");
        Ok(())
    }

    /// Parse and import a backup file. Shape and version are validated
    /// before any store is touched.
    ///
    /// # Errors
    ///
    /// Returns `BackupError::Format` for malformed payloads (no side
    /// effects) and `BackupError::Storage` for failed writes.
    pub async fn import_json(&self, json: &str) -> Result<(), BackupError> {
        let payload = BackupPayload::parse(json)?;
        self.import(&payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pacer_core::model::{QuestionType, QuestionTypeId};
    use pacer_core::time::{fixed_clock, fixed_now};
    use storage::repository::{InMemoryRepository, QuestionTypeRepository};

    fn seeded_repo() -> InMemoryRepository {
        InMemoryRepository::new()
    }

    #[tokio::test]
    async fn export_import_roundtrip() {
        let repo = seeded_repo();
        let question_type = QuestionType::new(
            QuestionTypeId::random(),
            "判断推理",
            Some("判断".into()),
            None,
            fixed_now(),
        )
        .unwrap();
        repo.upsert_question_type(&question_type).await.unwrap();

        let service = BackupService::new(Arc::new(repo.clone()), fixed_clock());
        let json = service.export_json().await.unwrap();

        let target = seeded_repo();
        let target_service = BackupService::new(Arc::new(target.clone()), fixed_clock());
        target_service.import_json(&json).await.unwrap();

        let restored = target.list_question_types().await.unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].name(), "判断推理");
        assert_eq!(restored[0].id(), question_type.id());
    }

    #[tokio::test]
    async fn malformed_payload_leaves_store_untouched() {
        let repo = seeded_repo();
        let question_type = QuestionType::new(
            QuestionTypeId::random(),
            "资料分析",
            None,
            None,
            fixed_now(),
        )
        .unwrap();
        repo.upsert_question_type(&question_type).await.unwrap();

        let service = BackupService::new(Arc::new(repo.clone()), fixed_clock());
        // valid export with one collection key removed entirely
        let json = service.export_json().await.unwrap();
        let broken = json.replace("\"stats_daily\": [],", "");

        let err = service.import_json(&broken).await.unwrap_err();
        assert!(matches!(err, BackupError::Format(_)));

        // the existing rows survived
        let kept = repo.list_question_types().await.unwrap();
        assert_eq!(kept.len(), 1);
    }
}

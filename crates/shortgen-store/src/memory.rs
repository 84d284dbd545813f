//! In-memory video store.
//!
//! Backs the dev worker binary and the test suites. Mirrors the record
//! store's single-row atomic update semantics with a `RwLock` map.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use shortgen_models::{VideoId, VideoRecord};

use crate::error::{StoreError, StoreResult};
use crate::store::{VideoPatch, VideoStore};

/// Process-local video store.
#[derive(Clone, Default)]
pub struct MemoryVideoStore {
    records: Arc<RwLock<HashMap<VideoId, VideoRecord>>>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn find_one(&self, video_id: &VideoId) -> StoreResult<Option<VideoRecord>> {
        Ok(self.records.read().await.get(video_id).cloned())
    }

    async fn create(&self, record: VideoRecord) -> StoreResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.video_id) {
            return Err(StoreError::AlreadyExists(record.video_id.to_string()));
        }
        records.insert(record.video_id.clone(), record);
        Ok(())
    }

    async fn update(&self, video_id: &VideoId, patch: VideoPatch) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(video_id)
            .ok_or_else(|| StoreError::not_found(video_id.to_string()))?;
        patch.apply(record);
        Ok(())
    }

    async fn delete(&self, video_id: &VideoId) -> StoreResult<()> {
        let mut records = self.records.write().await;
        records
            .remove(video_id)
            .ok_or_else(|| StoreError::not_found(video_id.to_string()))?;
        Ok(())
    }

    async fn find_stuck(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<VideoRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.processing && r.created_at < cutoff)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn create_find_update_delete() {
        let store = MemoryVideoStore::new();
        let id = VideoId::from("v1");
        store
            .create(VideoRecord::new(id.clone(), "prompt"))
            .await
            .unwrap();

        assert!(store.create(VideoRecord::new(id.clone(), "dup")).await.is_err());

        store
            .update(&id, VideoPatch::new().content("narration"))
            .await
            .unwrap();
        let record = store.find_one(&id).await.unwrap().unwrap();
        assert_eq!(record.content.as_deref(), Some("narration"));

        store.delete(&id).await.unwrap();
        assert!(store.find_one(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_record_errors() {
        let store = MemoryVideoStore::new();
        let err = store
            .update(&VideoId::from("nope"), VideoPatch::new().failed(true))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_stuck_filters_by_age_and_processing_flag() {
        let store = MemoryVideoStore::new();

        let mut old = VideoRecord::new(VideoId::from("old"), "p");
        old.created_at = Utc::now() - Duration::minutes(40);
        store.create(old).await.unwrap();

        let fresh = VideoRecord::new(VideoId::from("fresh"), "p");
        store.create(fresh).await.unwrap();

        let mut done = VideoRecord::new(VideoId::from("done"), "p");
        done.created_at = Utc::now() - Duration::minutes(40);
        done.processing = false;
        store.create(done).await.unwrap();

        let cutoff = Utc::now() - Duration::minutes(20);
        let stuck = store.find_stuck(cutoff).await.unwrap();
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].video_id.as_str(), "old");
    }
}

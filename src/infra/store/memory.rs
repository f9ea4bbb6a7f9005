//! In-memory credit record store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::domain::{
    AppError, CreditId, CreditPatch, CreditRecord, CreditRepository, InsertCreditRecord,
    StoreError,
};

#[derive(Debug)]
struct StoreInner {
    records: BTreeMap<CreditId, CreditRecord>,
    next_id: CreditId,
    closed: bool,
}

impl StoreInner {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Process-lifetime store of credit records.
///
/// Records live in a `BTreeMap` keyed by id, so `list` returns them in
/// insertion order. Ids start at 1 and are never reused, even after deletes.
/// Every operation holds the single lock for its whole read-modify-write.
#[derive(Debug)]
pub struct InMemoryCreditStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryCreditStore {
    /// Create an empty, open store.
    #[must_use]
    pub fn init() -> Self {
        info!("Initialized in-memory credit store");
        Self {
            inner: RwLock::new(StoreInner {
                records: BTreeMap::new(),
                next_id: 1,
                closed: false,
            }),
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.read().await.closed
    }
}

impl Default for InMemoryCreditStore {
    fn default() -> Self {
        Self::init()
    }
}

#[async_trait]
impl CreditRepository for InMemoryCreditStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.inner.read().await.ensure_open()?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<CreditRecord>, AppError> {
        let inner = self.inner.read().await;
        inner.ensure_open()?;
        Ok(inner.records.values().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn get(&self, id: CreditId) -> Result<Option<CreditRecord>, AppError> {
        let inner = self.inner.read().await;
        inner.ensure_open()?;
        Ok(inner.records.get(&id).cloned())
    }

    #[instrument(skip(self, input), fields(owner = %input.owner))]
    async fn create(&self, input: InsertCreditRecord) -> Result<CreditRecord, AppError> {
        let mut inner = self.inner.write().await;
        inner.ensure_open()?;

        let id = inner.next_id;
        inner.next_id = id
            .checked_add(1)
            .ok_or_else(|| StoreError::Internal("credit id space exhausted".to_string()))?;

        let record = CreditRecord::from_insert(id, input, Utc::now());
        inner.records.insert(id, record.clone());
        debug!(credit_id = id, "Stored credit record");
        Ok(record)
    }

    #[instrument(skip(self, patch))]
    async fn update(
        &self,
        id: CreditId,
        patch: &CreditPatch,
    ) -> Result<Option<CreditRecord>, AppError> {
        let mut inner = self.inner.write().await;
        inner.ensure_open()?;

        Ok(inner.records.get_mut(&id).map(|record| {
            record.apply(patch);
            record.clone()
        }))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: CreditId) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        inner.ensure_open()?;
        Ok(inner.records.remove(&id).is_some())
    }

    async fn count(&self) -> Result<usize, AppError> {
        let inner = self.inner.read().await;
        inner.ensure_open()?;
        Ok(inner.records.len())
    }

    #[instrument(skip(self))]
    async fn close(&self) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let dropped = inner.records.len();
        inner.records.clear();
        inner.closed = true;
        info!(dropped, "Closed credit store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn input(owner: &str) -> InsertCreditRecord {
        InsertCreditRecord::new("tx", owner, 10, "x")
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids_from_one() {
        let store = InMemoryCreditStore::init();

        let a = store.create(input("A")).await.unwrap();
        let b = store.create(input("B")).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(!a.listed);
    }

    #[tokio::test]
    async fn test_ids_are_never_reused_after_delete() {
        let store = InMemoryCreditStore::init();

        let a = store.create(input("A")).await.unwrap();
        let b = store.create(input("B")).await.unwrap();
        assert!(store.delete(b.id).await.unwrap());
        assert!(store.delete(a.id).await.unwrap());

        let c = store.create(input("C")).await.unwrap();
        assert_eq!(c.id, 3);
    }

    #[tokio::test]
    async fn test_list_reflects_surviving_records_in_order() {
        let store = InMemoryCreditStore::init();
        for owner in ["A", "B", "C"] {
            store.create(input(owner)).await.unwrap();
        }
        store.delete(2).await.unwrap();
        store
            .update(3, &CreditPatch::transfer_to("D"))
            .await
            .unwrap();

        let records = store.list().await.unwrap();
        let view: Vec<(CreditId, &str)> = records.iter().map(|r| (r.id, r.owner.as_str())).collect();
        assert_eq!(view, vec![(1, "A"), (3, "D")]);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = InMemoryCreditStore::init();
        let created = store
            .create(input("A").with_price(5).listed(true))
            .await
            .unwrap();

        let patch = CreditPatch {
            listed: Some(false),
            ..CreditPatch::default()
        };
        let updated = store.update(created.id, &patch).await.unwrap().unwrap();

        assert!(!updated.listed);
        assert_eq!(updated.price, Some(5));
        assert_eq!(updated.owner, "A");
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_missing_id_is_not_found_without_mutation() {
        let store = InMemoryCreditStore::init();
        store.create(input("A")).await.unwrap();

        assert!(
            store
                .update(42, &CreditPatch::transfer_to("B"))
                .await
                .unwrap()
                .is_none()
        );
        assert!(!store.delete(42).await.unwrap());
        assert!(store.get(42).await.unwrap().is_none());

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].owner, "A");
    }

    #[tokio::test]
    async fn test_close_rejects_further_operations() {
        let store = InMemoryCreditStore::init();
        store.create(input("A")).await.unwrap();

        store.close().await.unwrap();

        assert!(store.is_closed().await);
        assert!(matches!(
            store.list().await,
            Err(AppError::Store(StoreError::Closed))
        ));
        assert!(matches!(
            store.create(input("B")).await,
            Err(AppError::Store(StoreError::Closed))
        ));
        assert!(store.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_ids() {
        let store = Arc::new(InMemoryCreditStore::init());

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.create(input(&format!("owner-{i}"))).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.sort_unstable();
        ids.dedup();

        assert_eq!(ids.len(), 32);
        assert_eq!(store.count().await.unwrap(), 32);
    }
}

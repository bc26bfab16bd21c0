//! Read-through cache in front of a fingerprint store
//!
//! The first scan of a species loads that corpus into memory; later scans
//! are served from it. Writes go to the inner store first and then refresh
//! the cached entry. Writes and corpus loads are serialized so a load can
//! never install a record older than a concurrent write.

use async_trait::async_trait;
use parking_lot::RwLock;
use pawprint_fp::{FingerprintRecord, Species, SubjectId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{CorruptRecord, StoreError};
use crate::storage_backend::{FingerprintStore, RecordScan, ScanEntry};

#[derive(Default)]
struct CachedCorpus {
    records: BTreeMap<SubjectId, Arc<FingerprintRecord>>,
    /// Re-reported on every scan until the cache is invalidated
    corrupt: Vec<CorruptRecord>,
}

impl CachedCorpus {
    fn to_scan(&self) -> RecordScan {
        let entries: Vec<ScanEntry> = self
            .records
            .values()
            .cloned()
            .map(Ok)
            .chain(self.corrupt.iter().cloned().map(Err))
            .collect();
        RecordScan::new(entries.into_iter())
    }
}

pub struct CachedStore<S> {
    inner: S,
    corpora: RwLock<HashMap<Species, CachedCorpus>>,
    write_lock: tokio::sync::Mutex<()>,
}

impl<S: FingerprintStore> CachedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            corpora: RwLock::new(HashMap::new()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop every cached corpus; the next scan reloads from the inner store
    pub fn invalidate(&self) {
        self.corpora.write().clear();
    }

    pub fn is_loaded(&self, species: Species) -> bool {
        self.corpora.read().contains_key(&species)
    }

    fn cached_scan(&self, species: Species) -> Option<RecordScan> {
        self.corpora.read().get(&species).map(CachedCorpus::to_scan)
    }

    fn evict(&self, subject_id: &SubjectId) {
        for corpus in self.corpora.write().values_mut() {
            corpus.records.remove(subject_id);
        }
    }
}

#[async_trait]
impl<S: FingerprintStore> FingerprintStore for CachedStore<S> {
    async fn put(&self, record: &FingerprintRecord) -> Result<(), StoreError> {
        let _write = self.write_lock.lock().await;
        self.inner.put(record).await?;

        let mut corpora = self.corpora.write();
        for corpus in corpora.values_mut() {
            corpus.records.remove(&record.subject_id);
        }
        if let Some(corpus) = corpora.get_mut(&record.species) {
            corpus
                .records
                .insert(record.subject_id.clone(), Arc::new(record.clone()));
        }
        Ok(())
    }

    async fn get(&self, subject_id: &SubjectId) -> Result<FingerprintRecord, StoreError> {
        let cached = self
            .corpora
            .read()
            .values()
            .find_map(|corpus| corpus.records.get(subject_id).cloned());

        match cached {
            Some(record) => Ok(record.as_ref().clone()),
            None => self.inner.get(subject_id).await,
        }
    }

    async fn delete(&self, subject_id: &SubjectId) -> Result<(), StoreError> {
        let _write = self.write_lock.lock().await;
        let result = self.inner.delete(subject_id).await;
        self.evict(subject_id);
        result
    }

    async fn scan(&self, species: Species) -> Result<RecordScan, StoreError> {
        if let Some(scan) = self.cached_scan(species) {
            return Ok(scan);
        }

        let _write = self.write_lock.lock().await;
        // Another task may have loaded it while we waited
        if let Some(scan) = self.cached_scan(species) {
            return Ok(scan);
        }

        let mut corpus = CachedCorpus::default();
        for entry in self.inner.scan(species).await? {
            match entry {
                Ok(record) => {
                    corpus.records.insert(record.subject_id.clone(), record);
                }
                Err(corrupt) => corpus.corrupt.push(corrupt),
            }
        }
        log::info!(
            "Cached {} {} fingerprints ({} unreadable)",
            corpus.records.len(),
            species,
            corpus.corrupt.len()
        );

        let scan = corpus.to_scan();
        self.corpora.write().insert(species, corpus);
        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_backend::{FilesystemBackend, MemoryBackend};
    use crate::test_util::complete_record;

    fn record(id: &str, species: Species, status: &str) -> FingerprintRecord {
        let mut rec = complete_record(id, species, "test", vec![0.5, 0.5]);
        rec.lifecycle_status = status.to_string();
        rec
    }

    fn statuses(scan: RecordScan) -> Vec<(String, String)> {
        scan.filter_map(Result::ok)
            .map(|r| (r.subject_id.to_string(), r.lifecycle_status.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_scan_loads_once_and_put_refreshes() {
        let store = CachedStore::new(MemoryBackend::new());
        store.put(&record("1", Species::Dog, "lost")).await.unwrap();

        assert!(!store.is_loaded(Species::Dog));
        assert_eq!(store.scan(Species::Dog).await.unwrap().count(), 1);
        assert!(store.is_loaded(Species::Dog));

        store.put(&record("2", Species::Dog, "found")).await.unwrap();
        store.put(&record("1", Species::Dog, "home")).await.unwrap();

        assert_eq!(
            statuses(store.scan(Species::Dog).await.unwrap()),
            vec![
                ("1".to_string(), "home".to_string()),
                ("2".to_string(), "found".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_evicts() {
        let store = CachedStore::new(MemoryBackend::new());
        store.put(&record("1", Species::Cat, "lost")).await.unwrap();
        store.scan(Species::Cat).await.unwrap().for_each(drop);

        store.delete(&SubjectId::new("1").unwrap()).await.unwrap();
        assert_eq!(store.scan(Species::Cat).await.unwrap().count(), 0);
        assert!(matches!(
            store.get(&SubjectId::new("1").unwrap()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_species_change_moves_cached_record() {
        let store = CachedStore::new(MemoryBackend::new());
        store.put(&record("5", Species::Dog, "lost")).await.unwrap();
        store.scan(Species::Dog).await.unwrap().for_each(drop);
        store.scan(Species::Cat).await.unwrap().for_each(drop);

        store.put(&record("5", Species::Cat, "lost")).await.unwrap();
        assert_eq!(store.scan(Species::Dog).await.unwrap().count(), 0);
        assert_eq!(store.scan(Species::Cat).await.unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_entries_are_replayed() {
        let dir = tempfile::tempdir().unwrap();
        let store = CachedStore::new(FilesystemBackend::from_path(dir.path()));
        store.put(&record("1", Species::Dog, "lost")).await.unwrap();
        std::fs::write(dir.path().join("dog").join("2.json"), b"garbage").unwrap();

        for _ in 0..2 {
            let entries: Vec<ScanEntry> = store.scan(Species::Dog).await.unwrap().collect();
            assert_eq!(entries.len(), 2);
            assert_eq!(entries.iter().filter(|e| e.is_err()).count(), 1);
        }

        // Direct writes behind the cache stay invisible until invalidation
        std::fs::remove_file(dir.path().join("dog").join("2.json")).unwrap();
        assert_eq!(store.scan(Species::Dog).await.unwrap().count(), 2);
        store.invalidate();
        assert_eq!(store.scan(Species::Dog).await.unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_get_reads_through() {
        let store = CachedStore::new(MemoryBackend::new());
        store.inner().put(&record("8", Species::Cat, "found")).await.unwrap();
        let loaded = store.get(&SubjectId::new("8").unwrap()).await.unwrap();
        assert_eq!(loaded.lifecycle_status, "found");
    }
}

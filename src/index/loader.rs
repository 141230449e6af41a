//! Fetching and decoding indexes, with cooperative cancellation.
//!
//! A fetch can be abandoned at any point while bytes are in flight. Once the
//! bytes have arrived and decoding starts, decoding runs to completion.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::core::types::IndexName;
use crate::index::buckets::BucketMap;
use crate::index::matrix::BitSlicedIndex;
use crate::index::store::{IndexCatalog, IndexEntry, IndexFormat, IndexLocation};
use crate::index::IndexError;

/// Signals cancellation to every clone of the paired [`CancelToken`]
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes cancellation of an in-flight search
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Fresh handle/token pair
    #[must_use]
    pub fn pair() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Self { rx })
    }

    /// A token that is never cancelled
    #[must_use]
    pub fn never() -> Self {
        let (_, token) = Self::pair();
        token
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; pends forever if the handle is dropped first
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}

/// Byte source for index files and bucket maps
pub trait IndexSource: Send + Sync {
    fn fetch(
        &self,
        location: &IndexLocation,
    ) -> impl Future<Output = Result<Vec<u8>, IndexError>> + Send;
}

/// Reads local files with `tokio::fs` and URLs with `reqwest`
#[derive(Debug, Clone, Default)]
pub struct LocalOrRemoteSource {
    client: reqwest::Client,
}

impl LocalOrRemoteSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexSource for LocalOrRemoteSource {
    async fn fetch(&self, location: &IndexLocation) -> Result<Vec<u8>, IndexError> {
        match location {
            IndexLocation::Local(path) => {
                tracing::debug!("reading {}", path.display());
                tokio::fs::read(path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        IndexError::NotFound(path.display().to_string())
                    } else {
                        IndexError::Io(e)
                    }
                })
            }
            IndexLocation::Remote(url) => {
                tracing::debug!("fetching {url}");
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| IndexError::Fetch(e.to_string()))?;
                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(IndexError::NotFound(url.clone()));
                }
                let response = response
                    .error_for_status()
                    .map_err(|e| IndexError::Fetch(e.to_string()))?;
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| IndexError::Fetch(e.to_string()))?;
                Ok(bytes.to_vec())
            }
        }
    }
}

/// Loads and decodes catalog indexes, caching decoded matrices by name
#[derive(Debug)]
pub struct IndexLoader<S = LocalOrRemoteSource> {
    source: S,
    cache: Option<Mutex<HashMap<IndexName, Arc<BitSlicedIndex>>>>,
}

impl IndexLoader<LocalOrRemoteSource> {
    pub fn new() -> Self {
        Self::with_source(LocalOrRemoteSource::new())
    }
}

impl Default for IndexLoader<LocalOrRemoteSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: IndexSource> IndexLoader<S> {
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            cache: Some(Mutex::new(HashMap::new())),
        }
    }

    /// Disable the decoded-index cache
    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    fn cached(&self, name: &IndexName) -> Option<Arc<BitSlicedIndex>> {
        let cache = self.cache.as_ref()?;
        let guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
        guard.get(name).cloned()
    }

    fn remember(&self, name: &IndexName, index: &Arc<BitSlicedIndex>) {
        if let Some(cache) = &self.cache {
            let mut guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
            guard.insert(name.clone(), Arc::clone(index));
        }
    }

    /// Fetch raw bytes, giving up as soon as `cancel` fires
    pub async fn fetch(
        &self,
        location: &IndexLocation,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, IndexError> {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        tokio::select! {
            result = self.source.fetch(location) => result,
            () = cancel.cancelled() => Err(IndexError::Cancelled),
        }
    }

    /// Fetch, decode and validate the index for `entry`
    pub async fn load(
        &self,
        catalog: &IndexCatalog,
        entry: &IndexEntry,
        cancel: &CancelToken,
    ) -> Result<Arc<BitSlicedIndex>, IndexError> {
        if let Some(index) = self.cached(&entry.name) {
            tracing::debug!("index '{}' served from cache", entry.name);
            return Ok(index);
        }

        let location = catalog.resolve(&entry.path);
        let bytes = self.fetch(&location, cancel).await?;
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        let index = decode_entry(entry, &bytes)?;
        tracing::info!(
            "loaded index '{}' ({} rows x {} columns)",
            entry.name,
            index.num_rows(),
            index.num_cols()
        );

        let index = Arc::new(index);
        self.remember(&entry.name, &index);
        Ok(index)
    }

    /// Fetch the bucket map for `entry`, if it names one
    pub async fn load_bucket_map(
        &self,
        catalog: &IndexCatalog,
        entry: &IndexEntry,
        cancel: &CancelToken,
    ) -> Result<Option<BucketMap>, IndexError> {
        let Some(path) = &entry.bucket_map else {
            return Ok(None);
        };
        let bytes = self.fetch(&catalog.resolve(path), cancel).await?;
        Ok(Some(BucketMap::from_slice(&bytes)?))
    }
}

/// Decode bytes according to the entry's format and check them against it
pub fn decode_entry(entry: &IndexEntry, bytes: &[u8]) -> Result<BitSlicedIndex, IndexError> {
    let index = match entry.format {
        IndexFormat::Framed => BitSlicedIndex::decode_framed(bytes)?,
        IndexFormat::Raw => {
            let num_cols = entry.num_cols.ok_or_else(|| {
                IndexError::Malformed(format!(
                    "raw index '{}' needs num_cols in its catalog entry",
                    entry.name
                ))
            })?;
            let bloom_hash = entry.bloom_hash.ok_or_else(|| {
                IndexError::Malformed(format!(
                    "raw index '{}' needs bloom_hash in its catalog entry",
                    entry.name
                ))
            })?;
            BitSlicedIndex::decode_raw(bytes, num_cols, entry.minimizer, bloom_hash)?
        }
    };

    if let Some(expected) = entry.bloom_hash {
        if expected != index.bloom_hash() {
            return Err(IndexError::Malformed(format!(
                "index '{}' was built with Bloom hash {}, catalog expects {expected}",
                entry.name,
                index.bloom_hash()
            )));
        }
    }

    if let Some(expected) = entry.num_cols {
        if expected != index.num_cols() {
            return Err(IndexError::Malformed(format!(
                "index '{}' has {} columns, catalog expects {expected}",
                entry.name,
                index.num_cols()
            )));
        }
    }
    if let Some(expected) = entry.bloom_filter_size {
        if expected != index.num_rows() {
            return Err(IndexError::Malformed(format!(
                "index '{}' was built with Bloom filter size {}, catalog expects {expected}",
                entry.name,
                index.num_rows()
            )));
        }
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sketch::bloom::BloomHash;
    use crate::sketch::minimizer::MinimizerParams;

    struct Pending;

    impl IndexSource for Pending {
        async fn fetch(&self, _location: &IndexLocation) -> Result<Vec<u8>, IndexError> {
            std::future::pending().await
        }
    }

    fn demo_catalog(dir: &std::path::Path) -> (IndexCatalog, IndexEntry) {
        let index =
            BitSlicedIndex::from_words(2, 16, vec![0x8000, 0x0001], MinimizerParams::default())
                .unwrap();
        index.write_to(&dir.join("demo.fmi")).unwrap();

        let mut entry = IndexEntry::new("demo", "Demo", "demo.fmi");
        entry.bloom_filter_size = Some(2);
        let mut catalog = IndexCatalog::new();
        catalog.add_index(entry.clone());
        let path = dir.join("catalog.json");
        std::fs::write(&path, catalog.to_json().unwrap()).unwrap();
        (IndexCatalog::load_from_file(&path).unwrap(), entry)
    }

    #[tokio::test]
    async fn test_load_local_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, entry) = demo_catalog(dir.path());
        let loader = IndexLoader::new();

        let first = loader.load(&catalog, &entry, &CancelToken::never()).await.unwrap();
        assert_eq!(first.num_rows(), 2);

        std::fs::remove_file(dir.path().join("demo.fmi")).unwrap();
        let second = loader.load(&catalog, &entry, &CancelToken::never()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, entry) = demo_catalog(dir.path());
        std::fs::remove_file(dir.path().join("demo.fmi")).unwrap();

        let loader = IndexLoader::new().without_cache();
        let err = loader
            .load(&catalog, &entry, &CancelToken::never())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_filter_size_disagreement() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, mut entry) = demo_catalog(dir.path());
        entry.bloom_filter_size = Some(3);
        let err = IndexLoader::new()
            .load(&catalog, &entry, &CancelToken::never())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_cancel_during_fetch() {
        let loader = IndexLoader::with_source(Pending);
        let (handle, token) = CancelToken::pair();
        let location = IndexLocation::Local("never.fmi".into());

        let fetch = loader.fetch(&location, &token);
        handle.cancel();
        assert!(matches!(fetch.await, Err(IndexError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, entry) = demo_catalog(dir.path());
        let (handle, token) = CancelToken::pair();
        handle.cancel();
        let err = IndexLoader::new()
            .load(&catalog, &entry, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Cancelled));
    }

    #[test]
    fn test_never_token() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_raw_entry_requires_columns() {
        let mut entry = IndexEntry::new("raw", "Raw", "raw.bin");
        entry.format = IndexFormat::Raw;
        entry.bloom_hash = Some(BloomHash::Murmur3Decimal);
        assert!(matches!(
            decode_entry(&entry, &[0, 0]),
            Err(IndexError::Malformed(_))
        ));
        entry.num_cols = Some(16);
        let index = decode_entry(&entry, &[0x00, 0x80, 0x01, 0x00]).unwrap();
        assert_eq!(index.num_rows(), 2);
        assert!(index.get(0, 0));
        assert!(index.get(1, 15));
    }

    #[test]
    fn test_raw_entry_requires_known_bloom_hash() {
        let payload = [0x00, 0x80, 0x01, 0x00];
        let mut entry = IndexEntry::new("legacy", "Legacy", "legacy.bin");
        entry.format = IndexFormat::Raw;
        entry.num_cols = Some(16);

        let err = decode_entry(&entry, &payload).unwrap_err();
        assert!(matches!(err, IndexError::Malformed(msg) if msg.contains("bloom_hash")));

        entry.bloom_hash = Some(BloomHash::Unsupported);
        assert!(matches!(
            decode_entry(&entry, &payload),
            Err(IndexError::Malformed(_))
        ));

        entry.bloom_hash = Some(BloomHash::Murmur3Decimal);
        assert_eq!(decode_entry(&entry, &payload).unwrap().num_rows(), 2);
    }

    #[tokio::test]
    async fn test_framed_bloom_hash_disagreement() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, mut entry) = demo_catalog(dir.path());
        entry.bloom_hash = Some(BloomHash::Murmur3Decimal);
        let loader = IndexLoader::new().without_cache();
        assert!(loader.load(&catalog, &entry, &CancelToken::never()).await.is_ok());

        entry.bloom_hash = Some(BloomHash::Unsupported);
        let err = loader
            .load(&catalog, &entry, &CancelToken::never())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Malformed(_)));
    }
}

pub mod azure;
pub mod blob;
pub mod cache;
pub mod codec;

pub use azure::AzureBlobStore;
pub use blob::{BlobError, BlobStore, FsBlobStore};
pub use cache::DatasetCache;

use crate::config::{CacheBackend, CacheConfig};
use std::sync::Arc;

/// 按配置创建 Blob 存储
pub fn open_blob_store(config: &CacheConfig) -> Result<Arc<dyn BlobStore>, BlobError> {
    let store: Arc<dyn BlobStore> = match config.backend {
        CacheBackend::Fs => Arc::new(FsBlobStore::new(&config.container)),
        CacheBackend::Azure => Arc::new(AzureBlobStore::new(
            &config.container,
            config.sas_token.clone(),
        )?),
    };
    Ok(store)
}

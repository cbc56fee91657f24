use crate::error::{FiscalError, Result};
use crate::models::Dataset;
use crate::storage::blob::BlobStore;
use crate::storage::codec;
use std::sync::Arc;

/// 合并表缓存 (固定名字的单个 Parquet 对象)
///
/// 没有锁也没有版本: 两个同时 miss 的请求会各自构建并写入, 后写者覆盖。
#[derive(Clone)]
pub struct DatasetCache {
    store: Arc<dyn BlobStore>,
    blob_name: String,
}

impl DatasetCache {
    pub fn new(store: Arc<dyn BlobStore>, blob_name: impl Into<String>) -> Self {
        Self {
            store,
            blob_name: blob_name.into(),
        }
    }

    pub async fn exists(&self) -> Result<bool> {
        self.store
            .exists(&self.blob_name)
            .await
            .map_err(|e| FiscalError::CacheReadError(e.to_string()))
    }

    pub async fn load(&self) -> Result<Dataset> {
        let bytes = self
            .store
            .get(&self.blob_name)
            .await
            .map_err(|e| FiscalError::CacheReadError(e.to_string()))?;
        let table =
            codec::decode(bytes).map_err(|e| FiscalError::CacheReadError(e.to_string()))?;
        tracing::debug!(
            "cache loaded from {}: {} rows, {} columns",
            self.url(),
            table.row_count(),
            table.columns().len()
        );
        Ok(table)
    }

    /// 覆盖写入 (last-writer-wins)
    pub async fn store(&self, table: &Dataset) -> Result<()> {
        let bytes =
            codec::encode(table).map_err(|e| FiscalError::CacheWriteError(e.to_string()))?;
        let size = bytes.len();
        self.store
            .put(&self.blob_name, bytes)
            .await
            .map_err(|e| FiscalError::CacheWriteError(e.to_string()))?;
        tracing::info!("缓存已写入 {} ({} bytes, {} rows)", self.url(), size, table.row_count());
        Ok(())
    }

    /// 手动失效
    pub async fn invalidate(&self) -> Result<()> {
        self.store
            .delete(&self.blob_name)
            .await
            .map_err(|e| FiscalError::CacheWriteError(e.to_string()))?;
        tracing::info!("缓存已删除 {}", self.url());
        Ok(())
    }

    pub fn url(&self) -> String {
        self.store.url(&self.blob_name)
    }
}

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} em {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
}

/// Blob 存储抽象: 固定容器下按名字读写整块对象
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, name: &str) -> Result<bool, BlobError>;

    async fn get(&self, name: &str) -> Result<Bytes, BlobError>;

    /// 无条件覆盖
    async fn put(&self, name: &str, data: Bytes) -> Result<(), BlobError>;

    /// 对象不存在时视为成功
    async fn delete(&self, name: &str) -> Result<(), BlobError>;

    /// 对象的可读地址
    fn url(&self, name: &str) -> String;
}

/// 本地目录作为容器
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn exists(&self, name: &str) -> Result<bool, BlobError> {
        Ok(tokio::fs::try_exists(self.path(name)).await?)
    }

    async fn get(&self, name: &str) -> Result<Bytes, BlobError> {
        let data = tokio::fs::read(self.path(name)).await?;
        Ok(Bytes::from(data))
    }

    async fn put(&self, name: &str, data: Bytes) -> Result<(), BlobError> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.path(name), &data).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), BlobError> {
        match tokio::fs::remove_file(self.path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, name: &str) -> String {
        self.path(name).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_store_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("container"));

        assert!(!store.exists("a.bin").await.unwrap());
        store.put("a.bin", Bytes::from_static(b"one")).await.unwrap();
        store.put("a.bin", Bytes::from_static(b"two")).await.unwrap();
        assert!(store.exists("a.bin").await.unwrap());
        assert_eq!(store.get("a.bin").await.unwrap(), Bytes::from_static(b"two"));

        store.delete("a.bin").await.unwrap();
        store.delete("a.bin").await.unwrap();
        assert!(!store.exists("a.bin").await.unwrap());
        assert!(store.url("a.bin").ends_with("a.bin"));
    }
}

use crate::error::{FiscalError, Result};
use async_trait::async_trait;
use bytes::Bytes;

/// 源压缩包的获取方式
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    async fn fetch(&self) -> Result<Bytes>;

    fn location(&self) -> &str;
}

/// 通过 HTTP GET 下载 (客户端默认超时)
pub struct HttpArchiveSource {
    client: reqwest::Client,
    url: String,
}

impl HttpArchiveSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| FiscalError::SourceUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ArchiveSource for HttpArchiveSource {
    async fn fetch(&self) -> Result<Bytes> {
        let started = std::time::Instant::now();
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FiscalError::SourceUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::error!("下载失败 {}: HTTP {}", self.url, status);
            return Err(FiscalError::SourceUnavailable(format!(
                "HTTP {} ao baixar {}",
                status, self.url
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FiscalError::SourceUnavailable(e.to_string()))?;
        tracing::info!(
            "下载完成 {} ({} bytes, 耗时: {:?})",
            self.url,
            bytes.len(),
            started.elapsed()
        );
        Ok(bytes)
    }

    fn location(&self) -> &str {
        &self.url
    }
}

/// 内存中的压缩包 (本地文件 / 测试)
pub struct StaticArchive {
    bytes: Bytes,
}

impl StaticArchive {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl ArchiveSource for StaticArchive {
    async fn fetch(&self) -> Result<Bytes> {
        Ok(self.bytes.clone())
    }

    fn location(&self) -> &str {
        "memory"
    }
}

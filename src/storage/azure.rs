//! Azure Blob Storage (REST + SAS token)
//!
//! - HEAD   {container}/{blob}?{sas}  存在性
//! - GET    {container}/{blob}?{sas}  读取
//! - PUT    {container}/{blob}?{sas}  覆盖写入 (BlockBlob)
//! - DELETE {container}/{blob}?{sas}  删除

use crate::storage::blob::{BlobError, BlobStore};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, StatusCode};

const BLOB_TYPE_HEADER: &str = "x-ms-blob-type";
const API_VERSION_HEADER: &str = "x-ms-version";
const API_VERSION: &str = "2021-08-06";

pub struct AzureBlobStore {
    client: reqwest::Client,
    container_url: String,
    sas_token: Option<String>,
}

impl AzureBlobStore {
    pub fn new(container_url: &str, sas_token: Option<String>) -> Result<Self, BlobError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            container_url: container_url.trim_end_matches('/').to_string(),
            sas_token: sas_token
                .map(|t| t.trim_start_matches('?').to_string())
                .filter(|t| !t.is_empty()),
        })
    }

    fn signed_url(&self, name: &str) -> String {
        match &self.sas_token {
            Some(sas) => format!("{}?{}", self.url(name), sas),
            None => self.url(name),
        }
    }

    fn status_error(&self, status: StatusCode, name: &str) -> BlobError {
        BlobError::Status {
            status,
            url: self.url(name),
        }
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn exists(&self, name: &str) -> Result<bool, BlobError> {
        let resp = self
            .client
            .head(self.signed_url(name))
            .header(API_VERSION_HEADER, API_VERSION)
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(self.status_error(s, name)),
        }
    }

    async fn get(&self, name: &str) -> Result<Bytes, BlobError> {
        let resp = self
            .client
            .get(self.signed_url(name))
            .header(API_VERSION_HEADER, API_VERSION)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(self.status_error(resp.status(), name));
        }
        Ok(resp.bytes().await?)
    }

    async fn put(&self, name: &str, data: Bytes) -> Result<(), BlobError> {
        let resp = self
            .client
            .put(self.signed_url(name))
            .header(API_VERSION_HEADER, API_VERSION)
            .header(BLOB_TYPE_HEADER, "BlockBlob")
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(self.status_error(resp.status(), name));
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), BlobError> {
        let resp = self
            .client
            .delete(self.signed_url(name))
            .header(API_VERSION_HEADER, API_VERSION)
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            s => Err(self.status_error(s, name)),
        }
    }

    fn url(&self, name: &str) -> String {
        format!("{}/{}", self.container_url, name)
    }
}

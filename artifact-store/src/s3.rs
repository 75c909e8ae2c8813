//! S3-compatible backend: AWS S3, Cloudflare R2 (S3 API) and GCS interop.
//!
//! Endpoint and credentials are injected; consumer code only sees the
//! [`ObjectStore`] capability.

use crate::errors::{Result, StoreError};
use crate::object_store::ObjectStore;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

/// A parsed `DOCS_BUCKET_PATH`-style locator: `s3://bucket/prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPath {
    pub scheme: String,
    pub bucket: String,
    pub prefix: String,
}

impl BucketPath {
    /// Accepts `s3://`, `r2://` and `gs://`; the scheme only selects which
    /// endpoint configuration applies, the wire protocol is S3 either way.
    pub fn parse(raw: &str) -> Result<Self> {
        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| StoreError::InvalidBucketPath(raw.to_string()))?;
        if !matches!(scheme, "s3" | "r2" | "gs") {
            return Err(StoreError::InvalidBucketPath(raw.to_string()));
        }
        let (bucket, prefix) = match rest.split_once('/') {
            Some((b, p)) => (b, p.trim_end_matches('/')),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return Err(StoreError::InvalidBucketPath(raw.to_string()));
        }
        Ok(Self {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })
    }
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build from ambient AWS configuration plus an optional custom endpoint
    /// (R2 / GCS / MinIO). Path-style addressing is forced for custom
    /// endpoints because virtual-host addressing rarely works there.
    pub async fn from_env(bucket: impl Into<String>, endpoint: Option<&str>) -> Self {
        let base = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&base);
        if let Some(url) = endpoint {
            builder = builder.endpoint_url(url).force_path_style(true);
        }
        Self::new(aws_sdk_s3::Client::from_conf(builder.build()), bucket)
    }
}

fn backend_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        debug!(%key, size = bytes.len(), bucket = %self.bucket, "s3 put");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        match resp {
            Ok(out) => {
                let data = out.body.collect().await.map_err(backend_err)?;
                Ok(Some(data.into_bytes()))
            }
            Err(e) => {
                if e.as_service_error().map(|s| s.is_no_such_key()).unwrap_or(false) {
                    Ok(None)
                } else {
                    Err(backend_err(e))
                }
            }
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(backend_err)?;
            for obj in page.contents() {
                if let Some(key) = obj.key() {
                    keys.push(key.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        for key in self.list(prefix).await? {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(backend_err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_paths() {
        let p = BucketPath::parse("s3://docs-bucket/team/docs").unwrap();
        assert_eq!(p.scheme, "s3");
        assert_eq!(p.bucket, "docs-bucket");
        assert_eq!(p.prefix, "team/docs");

        let p = BucketPath::parse("r2://edge-docs").unwrap();
        assert_eq!(p.scheme, "r2");
        assert_eq!(p.prefix, "");

        let p = BucketPath::parse("gs://gcs-bucket/x/").unwrap();
        assert_eq!(p.prefix, "x");
    }

    #[test]
    fn rejects_unknown_schemes_and_empty_buckets() {
        assert!(BucketPath::parse("ftp://nope/x").is_err());
        assert!(BucketPath::parse("no-scheme").is_err());
        assert!(BucketPath::parse("s3:///x").is_err());
    }
}

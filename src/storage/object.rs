use std::sync::Arc;

use async_trait::async_trait;
use object_store::{ObjectStore, PutPayload, aws::AmazonS3Builder, path::Path as ObjectPath};
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::config::S3Config;

use super::{CrlStore, Result, StorageError};

/// Stores artifacts as objects in a bucket. Only this adapter touches the
/// object storage SDK.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    label: String,
}

impl ObjectStoreBackend {
    /// Wrap an already constructed client, e.g. `object_store::memory::InMemory`.
    pub fn new(store: Arc<dyn ObjectStore>, label: impl Into<String>) -> Self {
        Self {
            store,
            label: label.into(),
        }
    }

    /// Build an S3 client from configuration. Credentials left unset are
    /// picked up from the standard `AWS_*` environment.
    pub fn s3(config: &S3Config) -> std::result::Result<Self, object_store::Error> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_allow_http(config.allow_http);

        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(access_key_id) = &config.access_key_id {
            builder = builder.with_access_key_id(access_key_id);
        }
        if let Some(secret) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret.expose_secret());
        }

        let store = builder.build()?;
        info!("S3 client initialized for bucket '{}'", config.bucket);
        Ok(Self::new(Arc::new(store), "s3"))
    }
}

#[async_trait]
impl CrlStore for ObjectStoreBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = ObjectPath::from(key);
        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(StorageError::BackendUnavailable(e.to_string())),
        };

        let bytes = result.bytes().await.map_err(|e| StorageError::Read {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = ObjectPath::from(key);
        self.store
            .put(&path, PutPayload::from(data.to_vec()))
            .await
            .map_err(|e| StorageError::Write {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        debug!("PutObject {} ({} bytes) succeeded", key, data.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let backend = ObjectStoreBackend::new(Arc::new(InMemory::new()), "memory");

        assert!(matches!(backend.read("a.crl").await, Err(StorageError::NotFound(_))));
        assert!(!backend.exists("a.crl").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let backend = ObjectStoreBackend::new(Arc::new(InMemory::new()), "memory");

        backend.write("a.crl", b"bytes").await.unwrap();
        assert_eq!(backend.read("a.crl").await.unwrap(), b"bytes");
        assert_eq!(backend.name(), "memory");
    }

    #[test]
    fn test_s3_client_from_config() {
        let config = S3Config {
            enabled: true,
            bucket: "crls".into(),
            region: Some("us-east-1".into()),
            endpoint: Some("http://localhost:9000".into()),
            access_key_id: Some("minio".into()),
            secret_access_key: Some("minio-secret".to_string().into()),
            allow_http: true,
        };

        let backend = ObjectStoreBackend::s3(&config).expect("S3 client");
        assert_eq!(backend.name(), "s3");
    }
}

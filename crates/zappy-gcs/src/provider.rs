//! GcsObjectStore - IObjectStore implementation for Cloud Storage
//!
//! Wraps the [`GcsClient`] and translates its errors into the port-level
//! [`BackendError`].

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use zappy_core::domain::{BackendError, RemoteObjectRef};
use zappy_core::ports::{IObjectStore, PutResult};

use crate::auth::{CredentialsFile, OAuthTokenProvider};
use crate::client::GcsClient;
use crate::GcsError;

/// Object store backed by a Cloud Storage bucket
pub struct GcsObjectStore {
    client: GcsClient,
}

impl GcsObjectStore {
    /// Creates a new `GcsObjectStore` wrapping the given [`GcsClient`]
    pub fn new(client: GcsClient) -> Self {
        Self { client }
    }

    /// Builds a store from a credentials file
    ///
    /// `x-goog-user-project` is only sent when the key file declares a
    /// `quota_project_id`.
    pub fn from_credentials_file(path: &Path) -> Result<Self, GcsError> {
        let credentials = CredentialsFile::from_file(path)?;
        info!(
            kind = credentials.kind(),
            path = %path.display(),
            "Loaded GCS credentials"
        );
        let quota_project = credentials.quota_project().map(str::to_string);
        let tokens = Arc::new(OAuthTokenProvider::new(credentials));
        let mut client = GcsClient::new(tokens)?;
        if let Some(project) = quota_project {
            client = client.with_user_project(project);
        }
        debug!(
            endpoint = %client.base_url(),
            quota_project = client.user_project(),
            "GCS client ready"
        );
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &GcsClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IObjectStore for GcsObjectStore {
    fn provider_name(&self) -> &'static str {
        "gcs"
    }

    async fn exists(&self, object: &RemoteObjectRef) -> Result<bool, BackendError> {
        debug!(object = %object, "GcsObjectStore::exists");
        Ok(self
            .client
            .object_exists(object.bucket(), object.key().as_str())
            .await?)
    }

    async fn upload(
        &self,
        object: &RemoteObjectRef,
        local_path: &Path,
    ) -> Result<PutResult, BackendError> {
        debug!(object = %object, path = %local_path.display(), "GcsObjectStore::upload");
        Ok(self
            .client
            .insert_object(object.bucket(), object.key().as_str(), local_path)
            .await?)
    }
}

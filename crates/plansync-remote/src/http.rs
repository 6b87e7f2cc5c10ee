//! HTTP implementation of [`RemoteBackend`]

use crate::backend::RemoteBackend;
use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::wire::{
    CreateProjectRequest, CreatedResponse, DeleteProjectRequest, ImportProjectRequest,
    ListResponse, RemoteProject, UpdateProjectRequest,
};
use async_trait::async_trait;
use plansync_model::{ProjectId, UserId};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

/// Project service client over HTTP/JSON
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base: Url,
}

impl HttpRemote {
    /// Build a client from configuration
    ///
    /// # Errors
    /// `RemoteError::InvalidBaseUrl` if no usable base URL resolves,
    /// `RemoteError::Transport` if the HTTP client cannot be built
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let base = config.resolve_base_url()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self::with_client(client, base))
    }

    /// Wrap an existing client
    #[inline]
    #[must_use]
    pub fn with_client(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    /// Base URL requests are resolved against
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base URL with `segments` appended as escaped path segments
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::InvalidBaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), "remote request failed");
        Err(RemoteError::from_status(status.as_u16(), &body))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteBackend for HttpRemote {
    #[instrument(skip_all, fields(user = %request.user_id))]
    async fn create(&self, request: &CreateProjectRequest) -> Result<ProjectId, RemoteError> {
        let url = self.endpoint(&["projects"])?;
        let response = self.send(self.client.post(url).json(request)).await?;
        let created: CreatedResponse = Self::decode(response).await?;
        debug!(id = %created.id, "project created remotely");
        Ok(created.id)
    }

    #[instrument(skip_all, fields(project = %id))]
    async fn update(
        &self,
        id: &ProjectId,
        request: &UpdateProjectRequest,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&["projects", id.as_str()])?;
        self.send(self.client.put(url).json(request)).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(project = %id))]
    async fn load(&self, id: &ProjectId, user: &UserId) -> Result<RemoteProject, RemoteError> {
        let mut url = self.endpoint(&["projects", id.as_str()])?;
        url.query_pairs_mut().append_pair("userId", user.as_str());
        let response = self.send(self.client.get(url)).await?;
        Self::decode(response).await
    }

    #[instrument(skip_all, fields(project = %id))]
    async fn delete(&self, id: &ProjectId, user: &UserId) -> Result<(), RemoteError> {
        let url = self.endpoint(&["projects", id.as_str()])?;
        let body = DeleteProjectRequest {
            user_id: user.clone(),
        };
        self.send(self.client.delete(url).json(&body)).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(user = %user))]
    async fn list_for_user(&self, user: &UserId) -> Result<Vec<RemoteProject>, RemoteError> {
        let url = self.endpoint(&["projects", "user", user.as_str()])?;
        let response = self.send(self.client.get(url)).await?;
        let list: ListResponse = Self::decode(response).await?;
        Ok(list.into_projects())
    }

    #[instrument(skip_all)]
    async fn list_public(&self) -> Result<Vec<RemoteProject>, RemoteError> {
        let url = self.endpoint(&["projects", "public"])?;
        let response = self.send(self.client.get(url)).await?;
        let list: ListResponse = Self::decode(response).await?;
        Ok(list.into_projects())
    }

    #[instrument(skip_all, fields(original = %request.original_id))]
    async fn import(&self, request: &ImportProjectRequest) -> Result<ProjectId, RemoteError> {
        let url = self.endpoint(&["projects", "import"])?;
        let response = self.send(self.client.post(url).json(request)).await?;
        let created: CreatedResponse = Self::decode(response).await?;
        Ok(created.id)
    }
}

//! JSON API client
//!
//! Thin typed layer over [`RequestExecutor`]: serializes request bodies,
//! decodes responses and wraps outcomes in [`NetworkResult`] for callers
//! that render loading/success/error states.

use std::sync::Arc;

use petclinic_common::time::{Clock, SystemClock};
use petclinic_domain::NetworkResult;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::errors::ApiError;
use super::executor::RequestExecutor;
use super::transport::ApiRequest;

/// Typed JSON client
#[derive(Debug)]
pub struct ApiClient<C: Clock = SystemClock> {
    executor: Arc<RequestExecutor<C>>,
}

impl<C: Clock> Clone for ApiClient<C> {
    fn clone(&self) -> Self {
        Self { executor: Arc::clone(&self.executor) }
    }
}

impl<C: Clock> ApiClient<C> {
    pub fn new(executor: Arc<RequestExecutor<C>>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<RequestExecutor<C>> {
        &self.executor
    }

    #[instrument(skip(self), fields(path = %path))]
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(&ApiRequest::get(path)).await
    }

    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(&ApiRequest::new(Method::POST, path).with_json(body)?).await
    }

    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(&ApiRequest::new(Method::PUT, path).with_json(body)?).await
    }

    #[instrument(skip(self), fields(path = %path))]
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.executor.execute(&ApiRequest::delete(path)).await.map(|_| ())
    }

    /// Execute an arbitrary request and decode its JSON body.
    pub async fn send<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        self.send_with_cancellation(request, &CancellationToken::new()).await
    }

    pub async fn send_with_cancellation<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let response = self.executor.execute_with_cancellation(request, cancel).await?;
        response.json()
    }

    /// GET `path` as a [`NetworkResult`].
    pub async fn fetch<T: DeserializeOwned>(&self, path: &str) -> NetworkResult<T, ApiError> {
        self.get(path).await.into()
    }
}

//! Origin loaders
//!
//! The loader is the only thing that talks to the origin. It receives the
//! resource id with the freshness token already stripped and must tolerate
//! concurrent calls for different ids.

use async_trait::async_trait;
use bytes::Bytes;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use crate::common::Result;

/// Resolves a resource id to origin bytes.
///
/// Return [`crate::Error::NotFound`] when the origin says the resource does
/// not exist and [`crate::Error::Loader`] for every other failure.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, resource_id: &str) -> Result<Bytes>;
}

/// Loader backed by an async closure
pub struct FnLoader<F, Fut> {
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

/// Wrap an async closure as a [`Loader`]
pub fn loader_fn<F, Fut>(f: F) -> FnLoader<F, Fut>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Bytes>> + Send + 'static,
{
    FnLoader {
        f,
        _fut: PhantomData,
    }
}

#[async_trait]
impl<F, Fut> Loader for FnLoader<F, Fut>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Bytes>> + Send + 'static,
{
    async fn load(&self, resource_id: &str) -> Result<Bytes> {
        (self.f)(resource_id.to_string()).await
    }
}

/// Fetches resources over HTTP(S).
///
/// An absolute `http(s)://` resource id is fetched as-is. Anything else is
/// joined to `base_url`.
pub struct HttpLoader {
    client: reqwest::Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl HttpLoader {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::Error::InvalidConfig(format!("origin client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.map(|b| b.trim_end_matches('/').to_string()),
            timeout,
        })
    }

    fn url_for(&self, resource_id: &str) -> Result<String> {
        if resource_id.starts_with("http://") || resource_id.starts_with("https://") {
            return Ok(resource_id.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!("{}/{}", base, resource_id.trim_start_matches('/'))),
            None => Err(crate::Error::InvalidKey(format!(
                "{} is not a URL and no origin base_url is configured",
                resource_id
            ))),
        }
    }
}

#[async_trait]
impl Loader for HttpLoader {
    async fn load(&self, resource_id: &str) -> Result<Bytes> {
        let url = self.url_for(resource_id)?;
        tracing::debug!(url = %url, "fetching from origin");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| crate::Error::Loader(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(crate::Error::NotFound(url));
        }
        if !status.is_success() {
            return Err(crate::Error::Loader(format!("GET {}: status {}", url, status)));
        }

        response
            .bytes()
            .await
            .map_err(|e| crate::Error::Loader(format!("GET {}: reading body: {}", url, e)))
    }
}

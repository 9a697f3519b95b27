//! HTTP stream acquisition over reqwest

use std::io;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::{ByteStream, StreamAcquirer};
use crate::config::HttpConfig;
use crate::error::{ConnectError, Fault};

/// Opens streams with `GET` requests
#[derive(Debug, Clone)]
pub struct HttpAcquirer {
    client: Client,
}

impl HttpAcquirer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from config (timeouts, user agent, default headers)
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name '{}'", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header '{}'", name))?;
            headers.insert(name, value);
        }

        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers);
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.read_timeout() {
            builder = builder.read_timeout(timeout);
        }

        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Default for HttpAcquirer {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

#[async_trait]
impl StreamAcquirer for HttpAcquirer {
    async fn open_stream(
        &self,
        endpoint: &Url,
        _cancel: &CancellationToken,
    ) -> Result<ByteStream, Fault> {
        let response = self.client.get(endpoint.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectError::Status { status }.into());
        }
        debug!(endpoint = %endpoint, %status, "Stream opened");

        // Body errors become io errors so the decoder reports them as read faults
        let body = response.bytes_stream().map_err(io::Error::other);
        Ok(body.boxed())
    }
}

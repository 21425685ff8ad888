//! Reqwest implementation of the retriever port

use std::time::Duration;

use async_trait::async_trait;

use crate::{domain::error::WorkerError, port::retriever::ResourceRetriever};

const USER_AGENT: &str = concat!("lynks-worker/", env!("CARGO_PKG_VERSION"));

pub struct ReqwestRetriever {
    client: reqwest::Client
}

impl ReqwestRetriever {
    pub fn new() -> Self {
        Self::with_timeout(30)
    }

    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new())
        }
    }
}

impl Default for ReqwestRetriever {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceRetriever for ReqwestRetriever {
    async fn get_string(&self, url: &str) -> Result<Option<String>, WorkerError> {
        let response =
            self.client.get(url).send().await.map_err(|e| WorkerError::Network(format!("GET request failed: {}", e)))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| WorkerError::Network(format!("Failed to read response body: {}", e)))?;
        Ok(Some(body))
    }
}

// src/crawl/fetch.rs
// =============================================================================
// This module turns an address into a page tree.
//
// The crawler only needs one operation - "give me the tree for this address" -
// so it's a trait. The real implementation does an HTTP GET with reqwest and
// parses the body; tests use an in-memory map instead.
//
// Errors:
// - Any failure comes back as a FetchError. The crawler logs it and moves on
//   to its next job; one bad page never stops the crawl.
// =============================================================================

use super::node::Node;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const USER_AGENT: &str = concat!("spider/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid address '{address}': {source}")]
    InvalidAddress {
        address: String,
        source: url::ParseError,
    },

    #[error("request to {address} failed: {source}")]
    Transport {
        address: String,
        source: reqwest::Error,
    },

    #[error("{address} answered HTTP {status}")]
    Status { address: String, status: StatusCode },
}

// Fetches and parses the resource behind an address
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, address: &str) -> Result<Node, FetchError>;
}

// Fetches pages over HTTP(S)
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    // Parameters:
    //   timeout: limit for the whole request, including reading the body
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, address: &str) -> Result<Node, FetchError> {
        let url = Url::parse(address).map_err(|source| FetchError::InvalidAddress {
            address: address.to_string(),
            source,
        })?;

        let transport = |source: reqwest::Error| FetchError::Transport {
            address: address.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                address: address.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(transport)?;
        Ok(Node::from_html(&body))
    }
}

// Serves pages from memory. Unknown addresses answer 404.
#[cfg(test)]
#[derive(Default)]
pub struct StaticFetcher {
    pages: std::collections::HashMap<String, Node>,
}

#[cfg(test)]
impl StaticFetcher {
    pub fn page(mut self, address: &str, tree: Node) -> Self {
        self.pages.insert(address.to_string(), tree);
        self
    }
}

#[cfg(test)]
#[async_trait]
impl Fetch for StaticFetcher {
    async fn fetch(&self, address: &str) -> Result<Node, FetchError> {
        self.pages
            .get(address)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                address: address.to_string(),
                status: StatusCode::NOT_FOUND,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_address_is_an_error() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidAddress { .. }));
        assert!(err.to_string().contains("not a url"));
    }

    #[tokio::test]
    async fn test_static_fetcher() {
        let fetcher = StaticFetcher::default().page("http://a.test/", Node::document());
        assert_eq!(fetcher.fetch("http://a.test/").await.unwrap(), Node::document());

        let err = fetcher.fetch("http://b.test/").await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}

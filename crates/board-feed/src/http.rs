//! HTTP transport: implements `FeedTransport` against the board server's
//! `/api/messages` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::config::ServerConfig;
use crate::error::FeedError;
use crate::service::FeedTransport;
use crate::types::{NewPost, PageRequest, RawItem};

const MESSAGES_PATH: &str = "/api/messages";

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for HttpTransportConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            base_url: server.base_url.clone(),
            connect_timeout: Duration::from_millis(server.connect_timeout_ms),
            request_timeout: Duration::from_millis(server.request_timeout_ms),
        }
    }
}

#[derive(Clone)]
pub struct HttpFeedTransport {
    http: Client,
    base_url: String,
}

impl HttpFeedTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, FeedError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FeedError::Transport {
                message: format!("build http client: {e}"),
            })?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn messages_url(&self) -> String {
        format!("{}{MESSAGES_PATH}", self.base_url)
    }

    async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, FeedError> {
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(FeedError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = res.bytes().await.map_err(map_reqwest)?;
        serde_json::from_slice(&bytes).map_err(|e| FeedError::MalformedPage {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl FeedTransport for HttpFeedTransport {
    async fn fetch_page(&self, request: PageRequest) -> Result<Vec<RawItem>, FeedError> {
        if request.limit == 0 {
            return Err(FeedError::InvalidArgument {
                message: "limit must be positive".into(),
            });
        }
        tracing::debug!(kind = %request.kind, limit = request.limit, "GET messages");
        let res = self
            .http
            .get(self.messages_url())
            .query(&request.query_pairs())
            .send()
            .await
            .map_err(map_reqwest)?;
        Self::decode(res).await
    }

    async fn publish(&self, post: NewPost) -> Result<RawItem, FeedError> {
        tracing::debug!(chars = post.body.chars().count(), "POST message");
        let res = self
            .http
            .post(self.messages_url())
            .json(&post)
            .send()
            .await
            .map_err(map_reqwest)?;
        Self::decode(res).await
    }
}

fn map_reqwest(err: reqwest::Error) -> FeedError {
    if err.is_decode() {
        return FeedError::MalformedPage {
            message: err.to_string(),
        };
    }
    FeedError::Transport {
        message: err.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let transport = HttpFeedTransport::new(HttpTransportConfig {
            base_url: "http://board.local:8080/".into(),
            ..HttpTransportConfig::default()
        })
        .unwrap();
        assert_eq!(transport.base_url(), "http://board.local:8080");
        assert_eq!(
            transport.messages_url(),
            "http://board.local:8080/api/messages"
        );
    }

    #[test]
    fn config_follows_server_section() {
        let server = ServerConfig {
            base_url: "https://example.org".into(),
            connect_timeout_ms: 750,
            request_timeout_ms: 3_000,
        };
        let config = HttpTransportConfig::from(&server);
        assert_eq!(config.connect_timeout, Duration::from_millis(750));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn zero_limit_is_rejected_before_sending() {
        let transport = HttpFeedTransport::new(HttpTransportConfig::default()).unwrap();
        let err = transport
            .fetch_page(PageRequest::freshest(0))
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::InvalidArgument { .. }));
    }
}

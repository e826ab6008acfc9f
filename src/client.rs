use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::model::{ParseError, Snapshot};

/// Mt.Gox BTC/USD ticker.
pub const DEFAULT_ENDPOINT: &str = "https://data.mtgox.com:443/api/2/BTCUSD/money/ticker";

pub const USER_AGENT: &str = "coinstat";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request superseded by a newer poll")]
    Cancelled,

    #[error("fetch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("malformed response: {0}")]
    Parse(#[from] ParseError),
}

impl FetchError {
    /// Whether the request failed before a body could be parsed.
    pub fn is_transport(&self) -> bool {
        !matches!(self, FetchError::Parse(_))
    }
}

/// Anything that can produce ticker snapshots on demand.
#[async_trait]
pub trait TickerSource: Send + Sync {
    async fn poll(&self) -> Result<Snapshot, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub url: String,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ENDPOINT.to_owned(),
            user_agent: USER_AGENT.to_owned(),
        }
    }
}

/// Fetches the ticker over HTTPS.
#[derive(Clone)]
pub struct Fetcher {
    http: Client,
    url: String,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let http = Client::builder().user_agent(config.user_agent).build()?;

        Ok(Self {
            http,
            url: config.url,
        })
    }
}

#[async_trait]
impl TickerSource for Fetcher {
    #[instrument(skip(self), fields(url = %self.url), level = "debug")]
    async fn poll(&self) -> Result<Snapshot, FetchError> {
        let resp = self.http.get(&self.url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        debug!(%status, bytes = body.len(), "ticker response received");

        Ok(Snapshot::from_body(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::model::tests::ticker_body;
    use crate::model::Field;

    /// Serve one canned response and hand back the request head the client sent.
    async fn serve_once(body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{addr}/api/2/BTCUSD/money/ticker"), handle)
    }

    fn fetcher(url: String) -> Fetcher {
        Fetcher::new(FetcherConfig {
            url,
            ..FetcherConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn default_config_targets_fixed_endpoint() {
        let config = FetcherConfig::default();
        assert_eq!(config.url, DEFAULT_ENDPOINT);
        assert_eq!(config.user_agent, "coinstat");
    }

    #[tokio::test]
    async fn fetches_and_parses_ticker() {
        let (url, server) = serve_once(ticker_body("100", "101")).await;

        let snap = fetcher(url).poll().await.unwrap();
        assert_eq!(snap.stat(Field::Buy).raw, "100");
        assert_eq!(snap.value(Field::Sell), 101.0);

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /api/2/btcusd/money/ticker "));
        assert!(request.contains("user-agent: coinstat"));
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let (url, server) = serve_once("not json".to_owned()).await;

        let err = fetcher(url).poll().await.unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
        assert!(!err.is_transport());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetcher(format!("http://{addr}/ticker")).poll().await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
        assert!(err.is_transport());
    }
}

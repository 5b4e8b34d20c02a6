use super::store::EndpointStatus;
use crate::error::PoolError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

pub const TCP_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
pub const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Response bodies are cut to this many chars before they reach a log line.
const MAX_BODY_CHARS: usize = 512;

/// Probe with `GET {protocol}://{endpoint}{path}` instead of a bare TCP connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpProbeOptions {
    /// "http" or "https". Empty means "http".
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default)]
    pub path: String,
}

fn default_protocol() -> String {
    "http".to_string()
}

impl HttpProbeOptions {
    pub fn new(protocol: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            path: path.into(),
        }
        .normalized()
    }

    fn normalized(mut self) -> Self {
        if self.protocol.is_empty() {
            self.protocol = default_protocol();
        }
        self
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}://{}{}", self.protocol, endpoint, self.path)
    }
}

/// How a successful probe reached its verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    Tcp,
    Http,
    /// The health route answered 404, so a TCP connect decided instead.
    TcpFallback,
}

enum Strategy {
    Tcp,
    Http {
        client: reqwest::Client,
        options: HttpProbeOptions,
    },
}

/// One-shot connectivity check against a single endpoint.
pub struct Prober {
    strategy: Strategy,
}

impl Prober {
    /// HTTP probing when `http` is set, TCP otherwise.
    pub fn new(http: Option<HttpProbeOptions>) -> Result<Self, PoolError> {
        match http {
            Some(options) => Self::http(options),
            None => Ok(Self::tcp()),
        }
    }

    pub fn tcp() -> Self {
        Self {
            strategy: Strategy::Tcp,
        }
    }

    /// Probes target internal infrastructure, so peer certificates are not
    /// verified. Connections are never pooled: every probe dials fresh.
    pub fn http(options: HttpProbeOptions) -> Result<Self, PoolError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_PROBE_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()?;
        Ok(Self {
            strategy: Strategy::Http {
                client,
                options: options.normalized(),
            },
        })
    }

    pub fn http_options(&self) -> Option<&HttpProbeOptions> {
        match &self.strategy {
            Strategy::Tcp => None,
            Strategy::Http { options, .. } => Some(options),
        }
    }

    /// Run the configured check and report how it succeeded, or why not.
    pub async fn check(&self, endpoint: &str) -> Result<ProbeMethod, PoolError> {
        match &self.strategy {
            Strategy::Tcp => check_tcp(endpoint).await.map(|_| ProbeMethod::Tcp),
            Strategy::Http { client, options } => check_http(client, options, endpoint).await,
        }
    }

    /// Like `check`, but failures are logged and folded into `Unavailable`.
    pub async fn probe(&self, endpoint: &str) -> EndpointStatus {
        match self.check(endpoint).await {
            Ok(method) => {
                debug!(
                    "pool: probe: endpoint available, endpoint={}, method={:?}",
                    endpoint, method
                );
                EndpointStatus::Available
            }
            Err(e) => {
                warn!(
                    "pool: probe: endpoint unavailable, endpoint={}, error={}",
                    endpoint, e
                );
                EndpointStatus::Unavailable
            }
        }
    }
}

async fn check_tcp(endpoint: &str) -> Result<(), PoolError> {
    let mut stream = match tokio::time::timeout(TCP_PROBE_TIMEOUT, TcpStream::connect(endpoint)).await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(PoolError::ProbeConnect(e)),
        Err(_) => return Err(PoolError::ProbeTimeout(TCP_PROBE_TIMEOUT)),
    };

    if let Err(e) = stream.shutdown().await {
        debug!(
            "pool: probe: close conn failed, endpoint={}, error={}",
            endpoint, e
        );
    }
    Ok(())
}

async fn check_http(
    client: &reqwest::Client,
    options: &HttpProbeOptions,
    endpoint: &str,
) -> Result<ProbeMethod, PoolError> {
    let resp = client.get(options.url_for(endpoint)).send().await?;
    let status = resp.status();

    if status.is_success() {
        return Ok(ProbeMethod::Http);
    }
    // Peers without the health route still count if they accept connections.
    if status == reqwest::StatusCode::NOT_FOUND {
        check_tcp(endpoint).await?;
        return Ok(ProbeMethod::TcpFallback);
    }

    let body = match resp.text().await {
        Ok(text) => text.chars().take(MAX_BODY_CHARS).collect(),
        Err(e) => format!("<read resp error: {}>", e),
    };
    Err(PoolError::ProbeStatus {
        status: status.as_u16(),
        body,
    })
}

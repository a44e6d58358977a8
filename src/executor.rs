use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::header::{CACHE_CONTROL, PRAGMA, USER_AGENT};
use hyper::{Request, Uri};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use tokio::time;
use tokio_native_tls::native_tls;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::stats::{OutcomeKey, StatsStore};

type Client = HyperClient<HttpsConnector<HttpConnector>, Empty<Bytes>>;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/90.0.4430.93 Safari/537.36";

/// What happened to a single request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A response arrived before the deadline. Any status code counts.
    Success { status: u16, elapsed: Duration },
    Timeout,
    /// Connection, DNS, TLS or protocol failure, or an unusable URL.
    TransportError(String),
    Cancelled,
}

impl Outcome {
    pub fn key(&self) -> OutcomeKey {
        match self {
            Outcome::Success { status, .. } => OutcomeKey::Status(*status),
            Outcome::Timeout => OutcomeKey::Timeout,
            Outcome::TransportError(_) | Outcome::Cancelled => OutcomeKey::UnknownError,
        }
    }
}

/// Issues single GET requests over a shared pooled client and records every
/// result in the statistics store.
///
/// Certificate and hostname verification are disabled so self-signed
/// targets can be exercised.
#[derive(Clone)]
pub struct Executor {
    client: Client,
    stats: Arc<StatsStore>,
    timeout: Duration,
}

impl Executor {
    pub fn new(stats: Arc<StatsStore>, timeout: Duration) -> Result<Self, EngineError> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()?;
        let https = HttpsConnector::from((http, tokio_native_tls::TlsConnector::from(tls)));
        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(30))
            .build(https);

        Ok(Executor {
            client,
            stats,
            timeout,
        })
    }

    /// Sends one request to `url` and records its outcome. Never fails.
    pub async fn execute(&self, url: &str) -> Outcome {
        let outcome = self.send(url).await;
        self.record(url, &outcome);
        outcome
    }

    /// Like [`Executor::execute`], but gives up as soon as `cancel` fires.
    /// A cancelled request is recorded as an unknown error.
    pub async fn execute_until_cancelled(&self, url: &str, cancel: &CancellationToken) -> Outcome {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Outcome::Cancelled,
            outcome = self.send(url) => outcome,
        };
        self.record(url, &outcome);
        outcome
    }

    async fn send(&self, url: &str) -> Outcome {
        let req = match build_request(url) {
            Ok(req) => req,
            Err(e) => return Outcome::TransportError(e),
        };

        let start = Instant::now();
        let deadline = time::Instant::from_std(start) + self.timeout;

        let resp = match time::timeout_at(deadline, self.client.request(req)).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return Outcome::TransportError(e.to_string()),
            Err(_) => return Outcome::Timeout,
        };
        let elapsed = start.elapsed();
        let status = resp.status().as_u16();

        // Headers are enough for a success. The body drains in the background
        // so the connection can return to the pool.
        let body = resp.into_body();
        let url = url.to_string();
        tokio::spawn(async move {
            match time::timeout_at(deadline, body.collect()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::debug!("Failed to read body from {}: {}", url, e),
                Err(_) => tracing::debug!("Body from {} not drained before deadline", url),
            }
        });

        Outcome::Success { status, elapsed }
    }

    fn record(&self, url: &str, outcome: &Outcome) {
        let key = outcome.key().to_string();
        metrics::counter!("stressload_requests_total", "outcome" => key).increment(1);

        match outcome {
            Outcome::Success { status, elapsed } => {
                metrics::histogram!("stressload_response_time_ms")
                    .record(elapsed.as_secs_f64() * 1000.0);
                self.stats.record_success(url, *status, *elapsed);
            }
            Outcome::Timeout => {
                tracing::debug!("Request to {} timed out", url);
                self.stats.record_timeout(url);
            }
            Outcome::TransportError(e) => {
                tracing::debug!("Request to {} failed: {}", url, e);
                self.stats.record_error(url);
            }
            Outcome::Cancelled => {
                tracing::trace!("Request to {} cancelled", url);
                self.stats.record_error(url);
            }
        }
    }
}

fn build_request(url: &str) -> Result<Request<Empty<Bytes>>, String> {
    let parsed = url::Url::parse(url).map_err(|e| e.to_string())?;
    let uri = parsed.as_str().parse::<Uri>().map_err(|e| e.to_string())?;

    Request::builder()
        .method(hyper::Method::GET)
        .uri(uri)
        .header(USER_AGENT, BROWSER_USER_AGENT)
        .header(CACHE_CONTROL, "no-cache")
        .header(PRAGMA, "no-cache")
        .body(Empty::<Bytes>::new())
        .map_err(|e| e.to_string())
}

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// How the test server answers every request.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Respond(u16),
    Delay(Duration),
}

/// Plain-HTTP server on an ephemeral loopback port that records when each
/// request arrived.
pub struct TestServer {
    addr: SocketAddr,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl TestServer {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let arrivals = Arc::new(Mutex::new(Vec::new()));

        let recorded = arrivals.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |_req: Request<Incoming>| {
                        let recorded = recorded.clone();
                        async move {
                            recorded.lock().unwrap().push(Instant::now());
                            let status = match behavior {
                                Behavior::Respond(code) => StatusCode::from_u16(code).unwrap(),
                                Behavior::Delay(delay) => {
                                    tokio::time::sleep(delay).await;
                                    StatusCode::OK
                                }
                            };
                            Ok::<_, Infallible>(
                                Response::builder()
                                    .status(status)
                                    .body(Full::new(Bytes::from_static(b"ok")))
                                    .unwrap(),
                            )
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        TestServer { addr, arrivals }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.arrivals.lock().unwrap().len()
    }

    pub fn arrivals(&self) -> Vec<Instant> {
        self.arrivals.lock().unwrap().clone()
    }
}

/// A loopback URL whose server sends complete headers and the first bytes
/// of a 100-byte body, then stalls with the connection held open.
pub async fn stalled_body_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                if stream.read(&mut buf).await.is_err() {
                    return;
                }
                let head = b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\nab";
                if stream.write_all(head).await.is_err() {
                    return;
                }
                tokio::time::sleep(Duration::from_secs(60)).await;
                drop(stream);
            });
        }
    });

    format!("http://{}/", addr)
}

/// A loopback URL with nothing listening behind it.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/", addr)
}

/// Accounting rules every URL entry must satisfy after a run.
pub fn assert_consistent(stats: &stressload::UrlStats) {
    let tally: u64 = stats.response_codes.values().sum();
    assert_eq!(tally, stats.success_count + stats.error_count);
    assert_eq!(stats.response_times_ms.len() as u64, stats.success_count);
    assert_eq!(stats.error_count, stats.failed_count);
}

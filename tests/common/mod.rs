#![allow(dead_code)]

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Small HTTP peer: fixed `path → (status, body)` routes, 404 otherwise.
/// Counts accepted connections and records requested paths.
pub struct TestServer {
    addr: SocketAddr,
    accepts: Arc<AtomicUsize>,
    hits: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(routes: &[(&str, u16, &str)]) -> Self {
        let routes: Arc<HashMap<String, (u16, String)>> = Arc::new(
            routes
                .iter()
                .map(|(path, status, body)| (path.to_string(), (*status, body.to_string())))
                .collect(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));
        let hits = Arc::new(Mutex::new(Vec::new()));

        let task = tokio::spawn({
            let accepts = accepts.clone();
            let hits = hits.clone();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    accepts.fetch_add(1, Ordering::SeqCst);
                    let routes = routes.clone();
                    let hits = hits.clone();
                    tokio::spawn(async move {
                        let svc = service_fn(move |req: Request<Incoming>| {
                            let path = req.uri().path().to_string();
                            hits.lock().unwrap().push(path.clone());
                            let (status, body) = routes
                                .get(&path)
                                .cloned()
                                .unwrap_or((404, "not found".to_string()));
                            async move {
                                let mut resp = Response::new(Full::new(Bytes::from(body)));
                                *resp.status_mut() = StatusCode::from_u16(status).unwrap();
                                Ok::<_, Infallible>(resp)
                            }
                        });
                        let _ = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), svc)
                            .await;
                    });
                }
            }
        });

        Self {
            addr,
            accepts,
            hits,
            task,
        }
    }

    /// "127.0.0.1:port"
    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    /// Stop accepting; the port refuses new connections once this returns.
    pub async fn close(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

/// Bare TCP listener that accepts and drops connections, counting them.
pub async fn counting_listener() -> (String, Arc<AtomicUsize>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let accepts = Arc::new(AtomicUsize::new(0));
    let counter = accepts.clone();
    let task = tokio::spawn(async move {
        while listener.accept().await.is_ok() {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    (addr, accepts, task)
}

/// An endpoint nothing listens on.
pub async fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

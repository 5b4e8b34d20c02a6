mod admin;
pub mod bootstrap;
mod state;

pub use state::AdminState;

use anyhow::Result;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Bind the admin listener. Split from `serve_admin` so callers can learn the
/// bound address (port 0) before serving.
pub async fn bind_admin(listen: &str) -> Result<TcpListener> {
    let addr: SocketAddr = listen.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("server: admin listening, addr={}", listener.local_addr()?);
    Ok(listener)
}

/// Serve health, readiness, pool introspection and metrics until `shutdown`
/// is cancelled. Connections already accepted finish on their own.
pub async fn serve_admin(
    listener: TcpListener,
    state: AdminState,
    shutdown: CancellationToken,
) -> Result<()> {
    loop {
        let accepted = tokio::select! {
            result = listener.accept() => result,
            _ = shutdown.cancelled() => {
                info!("server: admin: stop accepting new connections");
                return Ok(());
            }
        };

        let stream = match accepted {
            Ok((stream, _)) => stream,
            Err(e) => {
                error!("server: admin: accept failed, error={}", e);
                continue;
            }
        };
        let state = state.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let svc = service_fn(move |req: Request<Incoming>| {
                let state = state.clone();
                async move { admin::handle_admin(req, state) }
            });

            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .http1()
                .keep_alive(true)
                .serve_connection(io, svc)
                .await
            {
                if !e.to_string().contains("connection closed") {
                    error!("server: admin: connection error, error={}", e);
                }
            }
        });
    }
}

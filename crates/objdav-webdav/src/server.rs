//! Listener, accept loop and per-connection serving.

use crate::error::ServerResult;
use crate::handler::DavHandler;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use objdav_tree::TreeMutator;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Configuration for the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 = auto-assign).
    pub port: u16,
    /// Bind address.
    pub bind_address: IpAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }
}

/// Handle to a listening server. Dropping it aborts the accept loop.
pub struct ObjDavServer {
    /// Bound address; the real port when configured with port 0.
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    accept_task: JoinHandle<()>,
}

impl ObjDavServer {
    /// Bind and start serving COPY/MOVE requests against `mutator`.
    pub async fn start(mutator: TreeMutator, config: ServerConfig) -> ServerResult<Self> {
        let listener =
            TcpListener::bind(SocketAddr::new(config.bind_address, config.port)).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "objdav listening");

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handler = DavHandler::new(mutator);
        let accept_task = tokio::spawn(accept_loop(listener, handler, shutdown_rx));

        Ok(Self {
            addr,
            shutdown: Some(shutdown),
            accept_task,
        })
    }

    /// Base URL of this server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.accept_task).await;
        info!(addr = %self.addr, "objdav stopped");
    }
}

impl Drop for ObjDavServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    handler: DavHandler,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let accepted = tokio::select! {
            _ = &mut shutdown => {
                debug!("accept loop shutting down");
                return;
            }
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                tokio::spawn(serve_connection(stream, peer, handler.clone()));
            }
            Err(e) => error!(error = %e, "accept failed"),
        }
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, handler: DavHandler) {
    let service = service_fn(move |req: Request<Incoming>| {
        let handler = handler.clone();
        async move { Ok::<_, Infallible>(handler.handle(req).await) }
    });
    if let Err(e) = auto::Builder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        warn!(%peer, error = %e, "connection closed with error");
    }
}

//! One-shot callback listener
//!
//! Serves `GET /callback` on a local address until the login resolves. The
//! returned [`ListenerGuard`] owns the accept loop and every connection it
//! accepted. [`ListenerGuard::close`] stops accepting, lets in-flight
//! responses finish for a bounded time and ends idle keep-alive connections.
//! Dropping the guard aborts all of it at once. Either way the port is
//! released, whatever path the coordinator leaves by.

use super::callback::{CallbackHandler, CallbackRejection};
use super::session::SessionStatus;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error};

/// Path the hosted login redirects back to
pub const CALLBACK_PATH: &str = "/callback";

/// Body shown in the browser tab after a successful login
pub const SUCCESS_BODY: &str = "Done, you can close this tab.";

/// Grace period for in-flight callback responses once closing
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A bound but not yet serving callback listener
pub struct CallbackListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl CallbackListener {
    /// Bind to `address` (port 0 lets the OS choose)
    pub async fn bind(address: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        let local_addr = listener.local_addr()?;
        debug!("Callback listener bound to {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start accepting connections, routing callbacks to `handler`
    pub fn serve(self, handler: Arc<CallbackHandler>) -> ListenerGuard {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let loop_handler = Arc::clone(&handler);
        let handle = tokio::spawn(async move {
            run_server(self.listener, loop_handler, shutdown_rx).await;
        });

        ListenerGuard {
            handler,
            local_addr: self.local_addr,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(handle),
        }
    }
}

/// Scope guard for a serving callback listener
pub struct ListenerGuard {
    handler: Arc<CallbackHandler>,
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<JoinHandle<()>>,
}

impl ListenerGuard {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop serving and wait until the socket and its connections are gone
    pub async fn close(mut self) {
        self.mark_closed();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        debug!("Callback listener on {} closed", self.local_addr);
    }

    /// Callbacks arriving from here on are refused
    fn mark_closed(&self) {
        self.handler.session().advance(SessionStatus::Closed);
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            self.mark_closed();
            // Dropping the task's JoinSet aborts every open connection
            handle.abort();
            debug!("Callback listener on {} aborted", self.local_addr);
        }
    }
}

/// Run the HTTP accept loop, then drain and end every connection
async fn run_server(
    listener: TcpListener,
    handler: Arc<CallbackHandler>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                break;
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        let io = TokioIo::new(stream);
                        let handler = Arc::clone(&handler);
                        let service = service_fn(move |req| {
                            let handler = Arc::clone(&handler);
                            async move { handle_request(req, handler).await }
                        });
                        let conn = graceful.watch(http1::Builder::new().serve_connection(io, service));
                        connections.spawn(async move {
                            if let Err(e) = conn.await {
                                debug!("Error serving callback connection from {}: {}", peer_addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept callback connection: {}", e);
                        continue;
                    }
                }
            }
        }
    }

    drop(listener);
    if tokio::time::timeout(DRAIN_TIMEOUT, graceful.shutdown())
        .await
        .is_err()
    {
        debug!("Callback connections still busy after {:?}; aborting", DRAIN_TIMEOUT);
    }
    connections.shutdown().await;
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    handler: Arc<CallbackHandler>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, CALLBACK_PATH) => match handler.handle(req.uri().query()).await {
            Ok(_) => text_response(StatusCode::OK, SUCCESS_BODY),
            Err(rejection) => unauthorized(&rejection),
        },
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    };
    Ok(response)
}

fn unauthorized(rejection: &CallbackRejection) -> Response<Full<Bytes>> {
    match rejection {
        CallbackRejection::StateMismatch | CallbackRejection::MissingCode => {
            text_response(StatusCode::UNAUTHORIZED, "Invalid callback")
        }
        CallbackRejection::TokenInvalid(_) => text_response(StatusCode::UNAUTHORIZED, "Login failed"),
        CallbackRejection::LoginClosed => text_response(StatusCode::GONE, "Login already completed"),
    }
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

//! HTTP/2 transport for registered services.
//!
//! Calls arrive as `POST /{service}/{method}` with a framed body and leave
//! with `grpc-status` / `grpc-message` headers. Plaintext connections speak
//! HTTP/1.1 or prior-knowledge HTTP/2; TLS connections negotiate via ALPN.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use parking_lot::Mutex;
use switchyard_core::ListenAddress;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::service::{ServerInterceptor, UnaryHandler, UnaryRequest};
use crate::codec::{decode_frame, encode_frame, parse_timeout, FRAME_HEADER_LEN};
use crate::credentials::ServerCredentials;
use crate::drain::DrainController;
use crate::error::StartError;
use crate::middleware::build_rpc_layers;
use crate::status::{Status, CONTENT_TYPE_GRPC, GRPC_STATUS, GRPC_TIMEOUT};

/// How long a drained server may spend closing idle connections before they are cut.
const FLUSH_WINDOW: Duration = Duration::from_millis(250);
/// Upper bound on waiting for the accept loop after connections are cut.
const FORCE_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Route table entry for one service.
pub(crate) struct ServiceRoute {
    pub(crate) methods: HashMap<String, UnaryHandler>,
    pub(crate) interceptors: Vec<Arc<dyn ServerInterceptor>>,
}

struct Dispatcher {
    services: HashMap<String, ServiceRoute>,
    drain: Arc<DrainController>,
    cancel: CancellationToken,
    max_message_size: usize,
    max_metadata_size: usize,
}

impl Dispatcher {
    async fn call(
        &self,
        service: String,
        method: String,
        metadata: HeaderMap,
        body: Body,
    ) -> Result<Bytes, Status> {
        let Some(_guard) = self.drain.admit() else {
            return Err(Status::unavailable("server is shutting down"));
        };
        let route = self
            .services
            .get(&service)
            .ok_or_else(|| Status::unimplemented(format!("unknown service {service}")))?;
        let handler = route
            .methods
            .get(&method)
            .ok_or_else(|| Status::unimplemented(format!("unknown method {service}/{method}")))?;

        let metadata_size: usize = metadata
            .iter()
            .map(|(name, value)| name.as_str().len() + value.len())
            .sum();
        if metadata_size > self.max_metadata_size {
            return Err(Status::resource_exhausted(format!(
                "request metadata of {metadata_size} bytes exceeds the {} byte limit",
                self.max_metadata_size
            )));
        }
        let deadline = metadata
            .get(GRPC_TIMEOUT)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_timeout);

        let body_limit = self.max_message_size.saturating_add(FRAME_HEADER_LEN);
        let body = axum::body::to_bytes(body, body_limit)
            .await
            .map_err(|_| {
                Status::resource_exhausted(format!(
                    "request exceeds the {} byte limit",
                    self.max_message_size
                ))
            })?;
        let request = UnaryRequest {
            service,
            method,
            metadata,
            message: decode_frame(body, self.max_message_size)?,
        };
        for interceptor in &route.interceptors {
            interceptor.intercept(&request)?;
        }

        let invocation = handler(request);
        let bounded = async {
            match deadline {
                Some(deadline) => tokio::time::timeout(deadline, invocation)
                    .await
                    .unwrap_or_else(|_| Err(Status::deadline_exceeded("deadline exceeded"))),
                None => invocation.await,
            }
        };
        tokio::select! {
            result = bounded => result,
            () = self.cancel.cancelled() => Err(Status::cancelled("server terminated")),
        }
    }
}

async fn dispatch(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path((service, method)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let outcome = dispatcher.call(service, method, headers, body).await;
    match outcome.and_then(|reply| encode_frame(&reply)) {
        Ok(frame) => {
            let mut response = (StatusCode::OK, frame).into_response();
            let headers = response.headers_mut();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_GRPC));
            headers.insert(GRPC_STATUS, HeaderValue::from_static("0"));
            response
        }
        Err(status) => {
            debug!(code = %status.code(), message = status.message(), "call failed");
            let mut response = StatusCode::OK.into_response();
            let headers = response.headers_mut();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_GRPC));
            status.write_headers(headers);
            response
        }
    }
}

/// A fully assembled server that has not yet bound its socket.
pub struct RpcServer {
    address: ListenAddress,
    credentials: ServerCredentials,
    router: Router,
    drain: Arc<DrainController>,
    cancel: CancellationToken,
}

impl RpcServer {
    pub(crate) fn new(
        address: ListenAddress,
        credentials: ServerCredentials,
        services: HashMap<String, ServiceRoute>,
        max_message_size: usize,
        max_metadata_size: usize,
    ) -> Self {
        let drain = Arc::new(DrainController::new());
        let cancel = CancellationToken::new();
        let dispatcher = Arc::new(Dispatcher {
            services,
            drain: Arc::clone(&drain),
            cancel: cancel.clone(),
            max_message_size,
            max_metadata_size,
        });
        let router = Router::new()
            .route("/{service}/{method}", post(dispatch))
            .layer(build_rpc_layers())
            .with_state(dispatcher);
        Self {
            address,
            credentials,
            router,
            drain,
            cancel,
        }
    }

    #[must_use]
    pub fn address(&self) -> &ListenAddress {
        &self.address
    }

    /// Binds the listening socket and starts serving in the background.
    ///
    /// # Errors
    ///
    /// Returns [`StartError::Bind`] if the address cannot be bound.
    pub async fn start(self) -> Result<ServerHandle, StartError> {
        let bind_address = self.address.to_string();
        let bind_error = |source| StartError::Bind {
            address: bind_address.clone(),
            source,
        };
        let listener = TcpListener::bind(&bind_address).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        let std_listener = listener.into_std().map_err(bind_error)?;

        let handle = axum_server::Handle::new();
        let service = self.router.into_make_service();
        let serve = match self.credentials {
            ServerCredentials::Insecure => {
                info!(%local_addr, "serving plaintext RPC");
                let server = axum_server::from_tcp(std_listener).handle(handle.clone());
                tokio::spawn(async move { server.serve(service).await })
            }
            ServerCredentials::Tls(config) => {
                info!(%local_addr, "serving TLS RPC");
                let server =
                    axum_server::from_tcp_rustls(std_listener, config).handle(handle.clone());
                tokio::spawn(async move { server.serve(service).await })
            }
        };

        let (terminated, _) = watch::channel(false);
        let terminated = Arc::new(terminated);
        let drain = Arc::clone(&self.drain);
        let on_exit = Arc::clone(&terminated);
        let task = tokio::spawn(async move {
            match serve.await {
                Ok(Ok(())) => debug!("accept loop finished"),
                Ok(Err(e)) => warn!(error = %e, "accept loop failed"),
                Err(e) => warn!(error = %e, "accept loop panicked or was aborted"),
            }
            drain.begin_drain();
            on_exit.send_replace(true);
        });

        self.drain.set_serving();
        Ok(ServerHandle {
            inner: Arc::new(HandleInner {
                local_addr,
                handle,
                drain: self.drain,
                cancel: self.cancel,
                terminated,
                task: Mutex::new(Some(task)),
            }),
        })
    }
}

impl std::fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcServer")
            .field("address", &self.address)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Control handle for a running server. Clones share the same server.
#[derive(Clone)]
pub struct ServerHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    local_addr: SocketAddr,
    handle: axum_server::Handle,
    drain: Arc<DrainController>,
    cancel: CancellationToken,
    terminated: Arc<watch::Sender<bool>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ServerHandle {
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.local_addr.port()
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.inner.drain.in_flight_count()
    }

    /// Whether shutdown has begun (new calls are rejected).
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.drain.is_draining()
    }

    /// Whether the accept loop has exited.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        *self.inner.terminated.borrow()
    }

    /// Stops accepting calls and connections. In-flight calls continue.
    pub fn shutdown(&self) {
        self.inner.drain.begin_drain();
        self.inner.handle.graceful_shutdown(None);
    }

    /// Waits for in-flight calls to finish. `None` waits without bound.
    ///
    /// Returns `true` if they finished before the timeout.
    pub async fn await_termination(&self, timeout: Option<Duration>) -> bool {
        self.inner.drain.wait_for_drain(timeout).await
    }

    /// Cancels in-flight calls, cuts connections, and waits for the accept loop to exit.
    pub async fn shutdown_now(&self) {
        self.inner.drain.begin_drain();
        let drained = self.inner.drain.in_flight_count() == 0;
        self.inner.cancel.cancel();

        let task = self.inner.task.lock().take();
        let Some(mut task) = task else {
            return;
        };
        if drained && tokio::time::timeout(FLUSH_WINDOW, &mut task).await.is_ok() {
            self.inner.drain.mark_stopped();
            return;
        }
        self.inner.handle.shutdown();
        if tokio::time::timeout(FORCE_CLOSE_TIMEOUT, &mut task)
            .await
            .is_err()
        {
            warn!("accept loop did not exit after forced shutdown; aborting");
            task.abort();
            self.inner.terminated.send_replace(true);
        }
        self.inner.drain.mark_stopped();
    }

    /// Resolves once the accept loop has exited, for whatever reason.
    pub fn terminated(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut terminated = self.inner.terminated.subscribe();
        async move {
            // A dropped sender also means the server is gone.
            let _ = terminated.wait_for(|done| *done).await;
        }
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.inner.local_addr)
            .field("in_flight", &self.in_flight_count())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

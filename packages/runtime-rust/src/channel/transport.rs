//! Live channel handle over an HTTP/2 client.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use switchyard_core::GracePeriod;
use tokio_util::sync::CancellationToken;

use super::builder::ChannelSettings;
use crate::codec::{decode_frame, encode_frame, encode_timeout, FRAME_HEADER_LEN};
use crate::drain::{DrainController, ServingState};
use crate::error::ShutdownError;
use crate::status::{Code, Status, CONTENT_TYPE_GRPC, GRPC_TIMEOUT};

const ROUND_ROBIN: &str = "round_robin";

/// A cloneable handle to one logical channel.
///
/// Clones share admission state, so shutting down any clone shuts down all of them.
#[derive(Debug, Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

#[derive(Debug)]
struct ChannelInner {
    target: String,
    base_urls: Vec<String>,
    round_robin: bool,
    next: AtomicUsize,
    client: reqwest::Client,
    default_deadline: Option<Duration>,
    max_inbound_message_size: usize,
    max_inbound_metadata_size: usize,
    drain: DrainController,
    cancel: CancellationToken,
}

impl Channel {
    pub(crate) fn new(
        target: String,
        base_urls: Vec<String>,
        client: reqwest::Client,
        settings: &ChannelSettings,
    ) -> Self {
        let drain = DrainController::new();
        drain.set_serving();
        Self {
            inner: Arc::new(ChannelInner {
                target,
                base_urls,
                round_robin: settings.load_balancing_policy == ROUND_ROBIN,
                next: AtomicUsize::new(0),
                client,
                default_deadline: settings.default_deadline,
                max_inbound_message_size: settings.max_inbound_message_size,
                max_inbound_metadata_size: settings.max_inbound_metadata_size,
                drain,
                cancel: CancellationToken::new(),
            }),
        }
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.inner.target
    }

    /// Performs one unary call against `path` (`/package.Service/Method`).
    ///
    /// # Errors
    ///
    /// - `UNAVAILABLE` after shutdown, or when the peer cannot be reached
    /// - `CANCELLED` when [`Channel::shutdown_now`] interrupts the call
    /// - `DEADLINE_EXCEEDED` when the default deadline elapses
    /// - `RESOURCE_EXHAUSTED` when the response exceeds an inbound cap
    /// - any status the server returned
    pub async fn unary(&self, path: &str, message: Bytes) -> Result<Bytes, Status> {
        let Some(_guard) = self.inner.drain.admit() else {
            return Err(Status::unavailable(format!(
                "channel to {} is shut down",
                self.inner.target
            )));
        };
        let url = format!("{}{path}", self.pick_base_url());
        let body = encode_frame(&message)?;

        let mut request = self
            .inner
            .client
            .post(url)
            .header(CONTENT_TYPE, CONTENT_TYPE_GRPC)
            .header("te", "trailers")
            .body(body);
        if let Some(deadline) = self.inner.default_deadline {
            request = request
                .header(GRPC_TIMEOUT, encode_timeout(deadline))
                .timeout(deadline);
        }

        let call = async {
            let response = request.send().await.map_err(transport_status)?;
            self.check_metadata(response.headers())?;
            Status::check_headers(response.headers())?;
            if !response.status().is_success() {
                return Err(http_status(response.status()));
            }
            let limit = self.inner.max_inbound_message_size;
            let body_limit = limit.saturating_add(FRAME_HEADER_LEN);
            if let Some(length) = response.content_length() {
                if usize::try_from(length).map_or(true, |length| length > body_limit) {
                    return Err(Status::resource_exhausted(format!(
                        "response of {length} bytes exceeds the {limit} byte limit"
                    )));
                }
            }
            let body = response.bytes().await.map_err(transport_status)?;
            decode_frame(body, limit)
        };

        tokio::select! {
            result = call => result,
            () = self.inner.cancel.cancelled() => Err(Status::cancelled(format!(
                "channel to {} was shut down",
                self.inner.target
            ))),
        }
    }

    /// Stops admitting new calls. In-flight calls continue.
    pub fn shutdown(&self) {
        self.inner.drain.begin_drain();
    }

    /// Stops admitting new calls and cancels the ones in flight.
    pub fn shutdown_now(&self) {
        self.inner.drain.begin_drain();
        self.inner.cancel.cancel();
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.drain.is_draining()
    }

    /// Whether the channel is shut down with nothing left in flight.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.inner.drain.state() == ServingState::Stopped
            || (self.is_shutdown() && self.inner.drain.in_flight_count() == 0)
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.inner.drain.in_flight_count()
    }

    /// Waits for in-flight calls to finish. `None` waits without bound.
    ///
    /// Returns `true` if the channel terminated before the timeout.
    pub async fn await_termination(&self, timeout: Option<Duration>) -> bool {
        self.inner.drain.wait_for_drain(timeout).await
    }

    /// Shuts down following `grace`, forcing termination at the end.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::DrainTimeout`] when a bounded grace period
    /// expired with calls still in flight. They are cancelled either way.
    pub async fn close(&self, grace: GracePeriod) -> Result<(), ShutdownError> {
        self.shutdown();
        let drained = match grace {
            GracePeriod::Immediate => self.inner.drain.in_flight_count() == 0,
            GracePeriod::Bounded(timeout) => self.await_termination(Some(timeout)).await,
            GracePeriod::Unbounded => self.await_termination(None).await,
        };
        let in_flight = self.inner.drain.in_flight_count();
        self.shutdown_now();
        self.inner.drain.mark_stopped();
        if drained {
            Ok(())
        } else {
            Err(ShutdownError::DrainTimeout {
                target: self.inner.target.clone(),
                in_flight,
            })
        }
    }

    fn pick_base_url(&self) -> &str {
        let urls = &self.inner.base_urls;
        let index = if self.inner.round_robin && urls.len() > 1 {
            self.inner.next.fetch_add(1, Ordering::Relaxed) % urls.len()
        } else {
            0
        };
        &urls[index]
    }

    fn check_metadata(&self, headers: &HeaderMap) -> Result<(), Status> {
        let size: usize = headers
            .iter()
            .map(|(name, value)| name.as_str().len() + value.len())
            .sum();
        let limit = self.inner.max_inbound_metadata_size;
        if size > limit {
            return Err(Status::resource_exhausted(format!(
                "response metadata of {size} bytes exceeds the {limit} byte limit"
            )));
        }
        Ok(())
    }
}

fn transport_status(err: reqwest::Error) -> Status {
    if err.is_timeout() {
        Status::deadline_exceeded(err.to_string())
    } else {
        Status::unavailable(err.to_string())
    }
}

/// Maps an HTTP status that arrived without an RPC status.
fn http_status(status: StatusCode) -> Status {
    let code = match status {
        StatusCode::BAD_REQUEST => Code::Internal,
        StatusCode::UNAUTHORIZED => Code::Unauthenticated,
        StatusCode::FORBIDDEN => Code::PermissionDenied,
        StatusCode::NOT_FOUND => Code::Unimplemented,
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => Code::Unavailable,
        _ => Code::Unknown,
    };
    Status::new(code, format!("http status {status}"))
}

//! Tower layers wrapped around every RPC route.
//!
//! Ordering, outermost first: the request id is assigned before the trace
//! span opens, so spans carry it, and it is copied back onto the response last.

use axum::http::header::HeaderName;
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Header carrying the per-call request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The composed layer type returned by [`build_rpc_layers`].
pub type RpcLayers = Stack<
    PropagateRequestIdLayer,
    Stack<
        TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
        Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>,
    >,
>;

/// Builds the transport-level middleware: request id, tracing, request id propagation.
#[must_use]
pub fn build_rpc_layers() -> RpcLayers {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id))
        .into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_rpc_layers_does_not_panic() {
        let _layers = build_rpc_layers();
    }
}

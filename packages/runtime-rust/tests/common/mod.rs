#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use switchyard_core::GracePeriod;
use switchyard_runtime::{
    Channel, ChannelManager, ServerConfig, ServerFactory, ServerLifecycle, ServerLifecycleEvent,
    ServiceDefinition, UnaryRequest,
};
use tokio::sync::Notify;

pub type EventLog = Arc<Mutex<Vec<ServerLifecycleEvent>>>;

/// `demo.Echo/Echo` replies with the request message.
pub fn echo_service() -> ServiceDefinition {
    ServiceDefinition::new("demo.Echo")
        .unary("Echo", |request: UnaryRequest| async move { Ok(request.message) })
}

/// `demo.Slow/Wait` signals `started`, sleeps for `delay`, then replies `done`.
pub fn slow_service(started: Arc<Notify>, delay: Duration) -> ServiceDefinition {
    ServiceDefinition::new("demo.Slow").unary("Wait", move |_request: UnaryRequest| {
        let started = Arc::clone(&started);
        async move {
            started.notify_one();
            tokio::time::sleep(delay).await;
            Ok(Bytes::from_static(b"done"))
        }
    })
}

/// `demo.Id/Get` replies with `id`.
pub fn id_service(id: &'static str) -> ServiceDefinition {
    ServiceDefinition::new("demo.Id").unary("Get", move |_request: UnaryRequest| async move {
        Ok(Bytes::from_static(id.as_bytes()))
    })
}

/// Starts a lifecycle on an ephemeral loopback port, recording its events.
pub async fn start_server(
    factory: ServerFactory,
    grace: GracePeriod,
) -> (Arc<ServerLifecycle>, EventLog) {
    let events: EventLog = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&events);
    let lifecycle = ServerLifecycle::new(factory)
        .with_grace_period(grace)
        .with_events(Arc::new(move |event: ServerLifecycleEvent| {
            recorder.lock().push(event);
        }));
    lifecycle.start().await.expect("server should start");
    (Arc::new(lifecycle), events)
}

pub fn loopback_factory() -> ServerFactory {
    ServerFactory::new(ServerConfig::with_address("127.0.0.1:0"))
}

pub fn port_of(lifecycle: &ServerLifecycle) -> u16 {
    lifecycle.local_addr().expect("server should be bound").port()
}

pub fn plain_channel(manager: &ChannelManager, port: u16) -> Channel {
    manager
        .create_channel(&format!("127.0.0.1:{port}"))
        .expect("builder")
        .build()
        .expect("channel")
}

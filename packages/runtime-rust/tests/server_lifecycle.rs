mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use common::{
    echo_service, loopback_factory, plain_channel, port_of, slow_service, start_server,
};
use switchyard_core::GracePeriod;
use switchyard_runtime::server::ServerInterceptor;
use switchyard_runtime::{
    ChannelManager, Code, ConstructionError, ServerLifecycleEvent, ServerLifecycleState,
    StartError, Status, UnaryRequest,
};
use tokio::sync::Notify;

const SLOW_CALL: Duration = Duration::from_secs(3);

#[tokio::test]
async fn echo_round_trip_and_event_order() {
    let mut factory = loopback_factory();
    factory.add_service(echo_service());
    let grace = GracePeriod::Bounded(Duration::from_secs(1));
    let (server, events) = start_server(factory, grace).await;
    let port = port_of(&server);

    assert_eq!(
        events.lock().clone(),
        vec![ServerLifecycleEvent::Started {
            address: "127.0.0.1:0".to_string(),
            port,
        }]
    );

    let manager = ChannelManager::new();
    let channel = plain_channel(&manager, port);
    let reply = channel
        .unary("/demo.Echo/Echo", Bytes::from_static(b"ping"))
        .await
        .unwrap();
    assert_eq!(reply, Bytes::from_static(b"ping"));

    server.stop().await;
    assert_eq!(
        events.lock().clone(),
        vec![
            ServerLifecycleEvent::Started {
                address: "127.0.0.1:0".to_string(),
                port,
            },
            ServerLifecycleEvent::ShutdownInitiated,
            ServerLifecycleEvent::Terminated,
        ]
    );
    assert_eq!(server.state(), ServerLifecycleState::Terminated);
    assert!(!server.is_running());

    server.stop().await;
    assert_eq!(events.lock().len(), 3);
}

#[tokio::test]
async fn unknown_routes_are_unimplemented() {
    let mut factory = loopback_factory();
    factory.add_service(echo_service());
    let (server, _events) = start_server(factory, GracePeriod::Immediate).await;
    let manager = ChannelManager::new();
    let channel = plain_channel(&manager, port_of(&server));

    let unknown_method = channel
        .unary("/demo.Echo/Shout", Bytes::new())
        .await
        .unwrap_err();
    assert_eq!(unknown_method.code(), Code::Unimplemented);

    let unknown_service = channel
        .unary("/demo.Missing/Echo", Bytes::new())
        .await
        .unwrap_err();
    assert_eq!(unknown_service.code(), Code::Unimplemented);

    server.stop().await;
}

#[tokio::test]
async fn oversized_requests_are_resource_exhausted() {
    let mut config = switchyard_runtime::ServerConfig::with_address("127.0.0.1:0");
    config.max_inbound_message_size = switchyard_core::InboundSize::from_bytes(64);
    let mut factory = switchyard_runtime::ServerFactory::new(config);
    factory.add_service(echo_service());
    let (server, _events) = start_server(factory, GracePeriod::Immediate).await;
    let manager = ChannelManager::new();
    let channel = plain_channel(&manager, port_of(&server));

    let small = channel.unary("/demo.Echo/Echo", Bytes::from(vec![1u8; 64])).await;
    assert!(small.is_ok());
    let status = channel
        .unary("/demo.Echo/Echo", Bytes::from(vec![1u8; 4096]))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::ResourceExhausted);

    server.stop().await;
}

#[tokio::test]
async fn maximum_request_cap_accepts_requests() {
    let mut config = switchyard_runtime::ServerConfig::with_address("127.0.0.1:0");
    config.max_inbound_message_size = switchyard_core::InboundSize::from_bytes(u64::MAX);
    let mut factory = switchyard_runtime::ServerFactory::new(config);
    factory.add_service(echo_service());
    let (server, _events) = start_server(factory, GracePeriod::Immediate).await;
    let manager = ChannelManager::new();
    let channel = plain_channel(&manager, port_of(&server));

    let reply = channel
        .unary("/demo.Echo/Echo", Bytes::from(vec![5u8; 4096]))
        .await
        .unwrap();
    assert_eq!(reply.len(), 4096);

    server.stop().await;
}

#[tokio::test]
async fn deadlines_cut_slow_calls() {
    let mut factory = loopback_factory();
    factory.add_service(slow_service(Arc::new(Notify::new()), SLOW_CALL));
    let (server, _events) = start_server(factory, GracePeriod::Immediate).await;
    let manager = ChannelManager::new();
    let mut builder = manager
        .create_channel(&format!("127.0.0.1:{}", port_of(&server)))
        .unwrap();
    builder.default_deadline(Duration::from_millis(200));
    let channel = builder.build().unwrap();

    let started = Instant::now();
    let status = channel.unary("/demo.Slow/Wait", Bytes::new()).await.unwrap_err();
    assert_eq!(status.code(), Code::DeadlineExceeded);
    assert!(started.elapsed() < SLOW_CALL);

    server.stop().await;
}

struct DenyAll;

impl ServerInterceptor for DenyAll {
    fn name(&self) -> &str {
        "deny-all"
    }

    fn intercept(&self, _request: &UnaryRequest) -> Result<(), Status> {
        Err(Status::new(Code::PermissionDenied, "denied"))
    }
}

#[tokio::test]
async fn interceptors_reject_only_admitted_services() {
    let mut factory = loopback_factory().with_interceptor_filter(
        |_: &dyn ServerInterceptor, service: &switchyard_runtime::ServiceDefinition| {
            service.name() == "demo.Echo"
        },
    );
    factory.add_interceptor(Arc::new(DenyAll));
    factory.add_service(echo_service());
    factory.add_service(common::id_service("open"));
    let (server, _events) = start_server(factory, GracePeriod::Immediate).await;
    let manager = ChannelManager::new();
    let channel = plain_channel(&manager, port_of(&server));

    let denied = channel.unary("/demo.Echo/Echo", Bytes::new()).await.unwrap_err();
    assert_eq!(denied.code(), Code::PermissionDenied);
    assert_eq!(denied.message(), "denied");
    let open = channel.unary("/demo.Id/Get", Bytes::new()).await.unwrap();
    assert_eq!(open, Bytes::from_static(b"open"));

    server.stop().await;
}

#[tokio::test]
async fn duplicate_services_abort_start() {
    let mut factory = loopback_factory();
    factory.add_service(echo_service());
    factory.add_service(echo_service());
    let lifecycle = switchyard_runtime::ServerLifecycle::new(factory);

    match lifecycle.start().await {
        Err(StartError::Construction(ConstructionError::DuplicateService(name))) => {
            assert_eq!(name, "demo.Echo");
        }
        other => panic!("expected duplicate service failure, got {other:?}"),
    }
    assert_eq!(lifecycle.state(), ServerLifecycleState::Idle);
}

/// Starts a slow call and returns once the server has begun handling it.
async fn slow_call_in_flight(
    grace: GracePeriod,
) -> (
    Arc<switchyard_runtime::ServerLifecycle>,
    common::EventLog,
    tokio::task::JoinHandle<Result<Bytes, Status>>,
    ChannelManager,
) {
    let started = Arc::new(Notify::new());
    let mut factory = loopback_factory();
    factory.add_service(echo_service());
    factory.add_service(slow_service(Arc::clone(&started), SLOW_CALL));
    let (server, events) = start_server(factory, grace).await;

    let manager = ChannelManager::new();
    let channel = plain_channel(&manager, port_of(&server));
    let call = tokio::spawn(async move { channel.unary("/demo.Slow/Wait", Bytes::new()).await });
    started.notified().await;
    (server, events, call, manager)
}

#[tokio::test]
async fn zero_grace_terminates_without_waiting() {
    let (server, events, call, _manager) = slow_call_in_flight(GracePeriod::Immediate).await;

    let stopping = Instant::now();
    server.stop().await;
    assert!(stopping.elapsed() < Duration::from_secs(2));
    assert!(call.await.unwrap().is_err());
    assert_eq!(
        events.lock().last(),
        Some(&ServerLifecycleEvent::Terminated)
    );
}

#[tokio::test]
async fn bounded_grace_terminates_by_the_deadline() {
    let grace = Duration::from_millis(300);
    let (server, _events, call, _manager) = slow_call_in_flight(GracePeriod::Bounded(grace)).await;

    let stopping = Instant::now();
    server.stop().await;
    let elapsed = stopping.elapsed();
    assert!(elapsed >= grace, "stop returned before the grace period: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "stop outlived the grace period: {elapsed:?}");
    assert!(call.await.unwrap().is_err());
}

#[tokio::test]
async fn unbounded_grace_waits_for_in_flight_calls() {
    let (server, _events, call, _manager) = slow_call_in_flight(GracePeriod::Unbounded).await;

    let stopping = Instant::now();
    server.stop().await;
    assert!(stopping.elapsed() >= Duration::from_secs(2));
    assert_eq!(call.await.unwrap().unwrap(), Bytes::from_static(b"done"));
}

#[tokio::test]
async fn draining_server_rejects_new_calls() {
    let (server, _events, call, manager) =
        slow_call_in_flight(GracePeriod::Bounded(Duration::from_secs(5))).await;
    let port = port_of(&server);

    let stopper = Arc::clone(&server);
    let stop = tokio::spawn(async move { stopper.stop().await });
    while server.is_running() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let late = plain_channel(&manager, port)
        .unary("/demo.Echo/Echo", Bytes::new())
        .await
        .unwrap_err();
    assert_eq!(late.code(), Code::Unavailable);

    assert_eq!(call.await.unwrap().unwrap(), Bytes::from_static(b"done"));
    stop.await.unwrap();
}

#[tokio::test]
async fn interrupt_cuts_an_unbounded_drain_short() {
    let (server, events, call, _manager) = slow_call_in_flight(GracePeriod::Unbounded).await;

    let interrupt = server.interrupt_token();
    let stopper = Arc::clone(&server);
    let stopping = Instant::now();
    let stop = tokio::spawn(async move { stopper.stop().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    interrupt.cancel();

    stop.await.unwrap();
    assert!(stopping.elapsed() < Duration::from_secs(2));
    assert!(interrupt.is_cancelled());
    assert!(call.await.unwrap().is_err());
    assert_eq!(
        events.lock().clone()[1..],
        [
            ServerLifecycleEvent::ShutdownInitiated,
            ServerLifecycleEvent::Terminated
        ]
    );
}

//! Demo: serves an echo service, calls it once through a managed channel,
//! then runs until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use switchyard_core::EndpointConfig;
use switchyard_runtime::channel::EndpointConfigCustomizer;
use switchyard_runtime::credentials::StaticTlsBundles;
use switchyard_runtime::logging::{init_logging, LogFormat};
use switchyard_runtime::{
    ChannelManager, ComponentRegistry, NamedChannelCredentialsProvider, ServerFactory,
    ServerLifecycle, ServiceDefinition, Settings, UnaryRequest,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "switchyard-demo", about = "Echo server and client on one lifecycle")]
struct Args {
    /// JSON settings file. Defaults apply when omitted.
    #[arg(long, env = "SWITCHYARD_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn echo_service() -> ServiceDefinition {
    ServiceDefinition::new("demo.Echo")
        .unary("Echo", |request: UnaryRequest| async move { Ok(request.message) })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_format)?;

    let mut settings = match &args.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };

    let mut factory = ServerFactory::new(settings.server.clone());
    factory.add_service(echo_service());
    let server = Arc::new(ServerLifecycle::new(factory));

    let components = ComponentRegistry::new();
    components.register(server.clone());
    components.start_all().await?;

    let local = server
        .local_addr()
        .context("server lifecycle reported no bound address")?;
    settings.client.insert(
        "self",
        EndpointConfig::with_address(format!("static://127.0.0.1:{}", local.port())),
    );
    let registry = Arc::new(settings.client);
    let channels = Arc::new(
        ChannelManager::new()
            .with_targets(registry.clone())
            .with_credentials(Arc::new(NamedChannelCredentialsProvider::new(
                registry.clone(),
                Arc::new(StaticTlsBundles::new()),
            )))
            .with_customizer(EndpointConfigCustomizer::new(registry)),
    );
    components.register(channels.clone());

    let channel = channels.create_channel("self")?.build()?;
    let reply = channel
        .unary("/demo.Echo/Echo", Bytes::from_static(b"hello"))
        .await?;
    info!(reply = %String::from_utf8_lossy(&reply), "echo round trip");

    info!("press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    components.stop_all().await
}

//! Switchyard runtime: channel and server lifecycle management over
//! `axum`, `reqwest`, and `tokio`.

pub mod channel;
pub mod codec;
pub mod component;
pub mod credentials;
pub mod drain;
pub mod error;
pub mod events;
pub mod logging;
pub mod middleware;
pub mod server;
pub mod settings;
pub mod status;

pub use channel::{Channel, ChannelBuilder, ChannelBuilderCustomizer, ChannelManager};
pub use component::{ComponentRegistry, ManagedComponent};
pub use credentials::{
    ChannelCredentials, ChannelCredentialsProvider, InsecureCredentials,
    NamedChannelCredentialsProvider, ServerCredentials,
};
pub use error::{ConstructionError, SettingsError, ShutdownError, StartError};
pub use events::{BroadcastEventSink, LifecycleEventSink, ServerLifecycleEvent};
pub use server::{
    ServerConfig, ServerFactory, ServerLifecycle, ServerLifecycleState, ServiceDefinition,
    UnaryRequest,
};
pub use settings::Settings;
pub use status::{Code, Status};

//! RPC server: services, construction, transport, and lifecycle.

pub mod config;
pub mod factory;
pub mod lifecycle;
pub mod service;
pub mod transport;

pub use config::ServerConfig;
pub use factory::{ServerBuilder, ServerBuilderCustomizer, ServerFactory};
pub use lifecycle::{ServerLifecycle, ServerLifecycleState, SERVER_PHASE};
pub use service::{
    InterceptorFilter, ServerInterceptor, ServiceDefinition, ServiceFilter, ServiceRegistration,
    UnaryHandler, UnaryRequest,
};
pub use transport::{RpcServer, ServerHandle};

//! Client channels: construction, customization, and teardown.

pub mod builder;
pub mod customizer;
pub mod manager;
pub mod transport;

pub use builder::{ChannelBuilder, ChannelSettings, KeepAlive};
pub use customizer::{defaults, matching, ChannelBuilderCustomizer, EndpointConfigCustomizer};
pub use manager::ChannelManager;
pub use transport::Channel;

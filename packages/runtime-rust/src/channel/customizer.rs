//! Hooks that tune a [`ChannelBuilder`] before the channel is built.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use switchyard_core::ClientRegistry;

use super::builder::ChannelBuilder;

/// Adjusts a builder for the logical channel `name`.
///
/// Closures of the form `Fn(&str, &mut ChannelBuilder)` implement this trait.
pub trait ChannelBuilderCustomizer: Send + Sync {
    fn customize(&self, name: &str, builder: &mut ChannelBuilder);

    /// Runs `self`, then `next`.
    fn then<C>(self, next: C) -> Then<Self, C>
    where
        Self: Sized,
        C: ChannelBuilderCustomizer,
    {
        Then { first: self, next }
    }
}

impl<F> ChannelBuilderCustomizer for F
where
    F: Fn(&str, &mut ChannelBuilder) + Send + Sync,
{
    fn customize(&self, name: &str, builder: &mut ChannelBuilder) {
        self(name, builder);
    }
}

/// See [`ChannelBuilderCustomizer::then`].
#[derive(Debug, Clone)]
pub struct Then<A, B> {
    first: A,
    next: B,
}

impl<A, B> ChannelBuilderCustomizer for Then<A, B>
where
    A: ChannelBuilderCustomizer,
    B: ChannelBuilderCustomizer,
{
    fn customize(&self, name: &str, builder: &mut ChannelBuilder) {
        self.first.customize(name, builder);
        self.next.customize(name, builder);
    }
}

/// Applies `inner` only to channel names fully matching `pattern`.
#[derive(Debug, Clone)]
pub struct Matching<C> {
    pattern: Regex,
    inner: C,
}

/// Restricts `customizer` to names that fully match `pattern`.
///
/// # Errors
///
/// Returns the regex error if `pattern` does not compile.
pub fn matching<C>(pattern: &str, customizer: C) -> Result<Matching<C>, regex::Error>
where
    C: ChannelBuilderCustomizer,
{
    Ok(Matching {
        pattern: Regex::new(&format!("^(?:{pattern})$"))?,
        inner: customizer,
    })
}

impl<C: ChannelBuilderCustomizer> ChannelBuilderCustomizer for Matching<C> {
    fn customize(&self, name: &str, builder: &mut ChannelBuilder) {
        if self.pattern.is_match(name) {
            self.inner.customize(name, builder);
        }
    }
}

/// Customizer that changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Defaults;

/// Returns the no-op customizer, a neutral start for [`ChannelBuilderCustomizer::then`] chains.
#[must_use]
pub fn defaults() -> Defaults {
    Defaults
}

impl ChannelBuilderCustomizer for Defaults {
    fn customize(&self, _name: &str, _builder: &mut ChannelBuilder) {}
}

/// Applies the resolved endpoint config for each channel name.
pub struct EndpointConfigCustomizer {
    registry: Arc<ClientRegistry>,
}

impl EndpointConfigCustomizer {
    #[must_use]
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }
}

impl fmt::Debug for EndpointConfigCustomizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfigCustomizer").finish_non_exhaustive()
    }
}

impl ChannelBuilderCustomizer for EndpointConfigCustomizer {
    fn customize(&self, name: &str, builder: &mut ChannelBuilder) {
        let config = self.registry.endpoint(name);
        builder.apply_endpoint(&config);
    }
}

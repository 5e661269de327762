//! Server construction: service registration, duplicate detection,
//! interceptor admission, credentials, and builder customizers.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use switchyard_core::{InboundSize, ListenAddress};
use tracing::{debug, info};

use super::config::ServerConfig;
use super::service::{
    InterceptorFilter, ServerInterceptor, ServiceDefinition, ServiceFilter, ServiceRegistration,
};
use super::transport::{RpcServer, ServiceRoute};
use crate::credentials::ServerCredentials;
use crate::error::ConstructionError;

/// Adjusts the server builder before the server is assembled.
pub trait ServerBuilderCustomizer: Send + Sync {
    fn customize(&self, builder: &mut ServerBuilder);
}

impl<F> ServerBuilderCustomizer for F
where
    F: Fn(&mut ServerBuilder) + Send + Sync,
{
    fn customize(&self, builder: &mut ServerBuilder) {
        self(builder);
    }
}

/// Mutable server recipe handed to [`ServerBuilderCustomizer`]s.
pub struct ServerBuilder {
    address: String,
    credentials: ServerCredentials,
    max_inbound_message_size: usize,
    max_inbound_metadata_size: usize,
    services: Vec<ServiceRegistration>,
    interceptors: Vec<Arc<dyn ServerInterceptor>>,
    interceptor_filter: Option<Arc<dyn InterceptorFilter>>,
}

impl ServerBuilder {
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn set_address(&mut self, address: impl Into<String>) -> &mut Self {
        self.address = address.into();
        self
    }

    pub fn set_credentials(&mut self, credentials: ServerCredentials) -> &mut Self {
        self.credentials = credentials;
        self
    }

    pub fn set_max_inbound_message_size(&mut self, size: InboundSize) -> &mut Self {
        self.max_inbound_message_size = size.as_usize();
        self
    }

    pub fn set_max_inbound_metadata_size(&mut self, size: InboundSize) -> &mut Self {
        self.max_inbound_metadata_size = size.as_usize();
        self
    }

    /// Adds an interceptor for every service the interceptor filter admits.
    pub fn intercept(&mut self, interceptor: Arc<dyn ServerInterceptor>) -> &mut Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Names of the services that will be served, in registration order.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(ServiceRegistration::name)
    }

    fn admits(&self, interceptor: &dyn ServerInterceptor, service: &ServiceDefinition) -> bool {
        self.interceptor_filter
            .as_ref()
            .map_or(true, |filter| filter.filter(interceptor, service))
    }

    /// Assembles the route table. Global interceptors run before per-service ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::Config`] if the listen address cannot be parsed.
    pub fn build(self) -> Result<RpcServer, ConstructionError> {
        let address = ListenAddress::parse(&self.address)?;
        let mut routes = HashMap::with_capacity(self.services.len());
        for registration in &self.services {
            let mut interceptors = Vec::new();
            for interceptor in &self.interceptors {
                if self.admits(interceptor.as_ref(), &registration.definition) {
                    interceptors.push(Arc::clone(interceptor));
                }
            }
            interceptors.extend(registration.interceptors.iter().cloned());
            routes.insert(
                registration.name().to_string(),
                ServiceRoute {
                    methods: registration.definition.clone().into_methods().into_iter().collect(),
                    interceptors,
                },
            );
        }
        Ok(RpcServer::new(
            address,
            self.credentials,
            routes,
            self.max_inbound_message_size,
            self.max_inbound_metadata_size,
        ))
    }
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("address", &self.address)
            .field("credentials", &self.credentials)
            .field("services", &self.services)
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

/// Collects services and builds servers from them.
///
/// Services must all be added before [`ServerFactory::create_server`]; the
/// list is not designed for concurrent mutation.
pub struct ServerFactory {
    config: ServerConfig,
    credentials: ServerCredentials,
    services: Vec<ServiceRegistration>,
    interceptors: Vec<Arc<dyn ServerInterceptor>>,
    service_filter: Option<Arc<dyn ServiceFilter>>,
    interceptor_filter: Option<Arc<dyn InterceptorFilter>>,
    customizers: Vec<Arc<dyn ServerBuilderCustomizer>>,
}

impl ServerFactory {
    /// Creates a factory serving plaintext with no services.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            credentials: ServerCredentials::Insecure,
            services: Vec::new(),
            interceptors: Vec::new(),
            service_filter: None,
            interceptor_filter: None,
            customizers: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: ServerCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn with_service_filter(mut self, filter: impl ServiceFilter + 'static) -> Self {
        self.service_filter = Some(Arc::new(filter));
        self
    }

    #[must_use]
    pub fn with_interceptor_filter(mut self, filter: impl InterceptorFilter + 'static) -> Self {
        self.interceptor_filter = Some(Arc::new(filter));
        self
    }

    #[must_use]
    pub fn with_customizer(mut self, customizer: impl ServerBuilderCustomizer + 'static) -> Self {
        self.customizers.push(Arc::new(customizer));
        self
    }

    /// Adds an interceptor applied to every admitted service.
    pub fn add_interceptor(&mut self, interceptor: Arc<dyn ServerInterceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Appends a service unless the service filter rejects it.
    pub fn add_service(&mut self, service: impl Into<ServiceRegistration>) {
        let registration = service.into();
        if let Some(filter) = &self.service_filter {
            if !filter.filter(&registration.definition) {
                debug!(service = registration.name(), "service filtered out");
                return;
            }
        }
        self.services.push(registration);
    }

    /// Names of the registered services, in registration order.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(ServiceRegistration::name)
    }

    /// Whether `interceptor` applies to `service`. Without a filter every pair is admitted.
    #[must_use]
    pub fn supports(
        &self,
        interceptor: &dyn ServerInterceptor,
        service: &ServiceDefinition,
    ) -> bool {
        self.interceptor_filter
            .as_ref()
            .map_or(true, |filter| filter.filter(interceptor, service))
    }

    /// Builds a server from the registered services.
    ///
    /// # Errors
    ///
    /// - [`ConstructionError::DuplicateService`] if two services share a name
    /// - [`ConstructionError::Config`] if the listen address is invalid
    pub fn create_server(&self) -> Result<RpcServer, ConstructionError> {
        let mut seen = HashSet::with_capacity(self.services.len());
        for registration in &self.services {
            if !seen.insert(registration.name()) {
                return Err(ConstructionError::DuplicateService(
                    registration.name().to_string(),
                ));
            }
        }
        for registration in &self.services {
            info!(service = registration.name(), "registered service");
        }

        let mut builder = ServerBuilder {
            address: self.config.address.clone(),
            credentials: self.credentials.clone(),
            max_inbound_message_size: self.config.max_inbound_message_size.as_usize(),
            max_inbound_metadata_size: self.config.max_inbound_metadata_size.as_usize(),
            services: self.services.clone(),
            interceptors: self.interceptors.clone(),
            interceptor_filter: self.interceptor_filter.clone(),
        };
        for customizer in &self.customizers {
            customizer.customize(&mut builder);
        }
        builder.build()
    }
}

impl fmt::Debug for ServerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerFactory")
            .field("config", &self.config)
            .field("services", &self.services)
            .field("customizers", &self.customizers.len())
            .finish_non_exhaustive()
    }
}

//! Service definitions, interceptors, and registration filters.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use http::HeaderMap;

use crate::status::Status;

/// One inbound unary call.
#[derive(Debug, Clone)]
pub struct UnaryRequest {
    pub service: String,
    pub method: String,
    pub metadata: HeaderMap,
    pub message: Bytes,
}

/// Type-erased unary method implementation.
pub type UnaryHandler =
    Arc<dyn Fn(UnaryRequest) -> BoxFuture<'static, Result<Bytes, Status>> + Send + Sync>;

/// A named service and its unary methods.
#[derive(Clone)]
pub struct ServiceDefinition {
    name: String,
    methods: BTreeMap<String, UnaryHandler>,
}

impl ServiceDefinition {
    /// Creates a service with no methods. `name` is the fully qualified
    /// service name, e.g. `demo.Echo`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: BTreeMap::new(),
        }
    }

    /// Adds a unary method. A later method with the same name replaces the earlier one.
    #[must_use]
    pub fn unary<F, Fut>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(UnaryRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Bytes, Status>> + Send + 'static,
    {
        let handler: UnaryHandler = Arc::new(move |request| handler(request).boxed());
        self.methods.insert(method.into(), handler);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub(crate) fn into_methods(self) -> BTreeMap<String, UnaryHandler> {
        self.methods
    }
}

impl fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("name", &self.name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Admission hook run before a method handler.
///
/// Returning an error rejects the call with that status.
pub trait ServerInterceptor: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns the status to reply with when the call is rejected.
    fn intercept(&self, request: &UnaryRequest) -> Result<(), Status>;
}

/// A service plus the interceptors that apply only to it.
#[derive(Clone)]
pub struct ServiceRegistration {
    pub definition: ServiceDefinition,
    pub interceptors: Vec<Arc<dyn ServerInterceptor>>,
}

impl ServiceRegistration {
    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn ServerInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.definition.name()
    }
}

impl From<ServiceDefinition> for ServiceRegistration {
    fn from(definition: ServiceDefinition) -> Self {
        Self {
            definition,
            interceptors: Vec::new(),
        }
    }
}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("definition", &self.definition)
            .field(
                "interceptors",
                &self.interceptors.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Decides whether a service is registered at all. Rejection is silent.
pub trait ServiceFilter: Send + Sync {
    fn filter(&self, service: &ServiceDefinition) -> bool;
}

impl<F> ServiceFilter for F
where
    F: Fn(&ServiceDefinition) -> bool + Send + Sync,
{
    fn filter(&self, service: &ServiceDefinition) -> bool {
        self(service)
    }
}

/// Decides whether a global interceptor applies to a service.
pub trait InterceptorFilter: Send + Sync {
    fn filter(&self, interceptor: &dyn ServerInterceptor, service: &ServiceDefinition) -> bool;
}

impl<F> InterceptorFilter for F
where
    F: Fn(&dyn ServerInterceptor, &ServiceDefinition) -> bool + Send + Sync,
{
    fn filter(&self, interceptor: &dyn ServerInterceptor, service: &ServiceDefinition) -> bool {
        self(interceptor, service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> ServiceDefinition {
        ServiceDefinition::new("demo.Echo")
            .unary("Echo", |request: UnaryRequest| async move { Ok(request.message) })
            .unary("Fail", |_request: UnaryRequest| async move {
                Err(Status::internal("boom"))
            })
    }

    fn request(method: &str, message: &'static [u8]) -> UnaryRequest {
        UnaryRequest {
            service: "demo.Echo".to_string(),
            method: method.to_string(),
            metadata: HeaderMap::new(),
            message: Bytes::from_static(message),
        }
    }

    #[test]
    fn methods_are_listed_in_name_order() {
        let service = echo();
        assert_eq!(service.name(), "demo.Echo");
        assert_eq!(service.method_names().collect::<Vec<_>>(), ["Echo", "Fail"]);
    }

    #[tokio::test]
    async fn handlers_are_invoked_through_erasure() {
        let methods = echo().into_methods();
        let reply = methods["Echo"](request("Echo", b"hi")).await.unwrap();
        assert_eq!(reply, Bytes::from_static(b"hi"));
        let status = methods["Fail"](request("Fail", b"")).await.unwrap_err();
        assert_eq!(status.message(), "boom");
    }

    #[test]
    fn closures_are_service_filters() {
        let only_echo = |service: &ServiceDefinition| service.name() == "demo.Echo";
        assert!(only_echo.filter(&echo()));
        assert!(!only_echo.filter(&ServiceDefinition::new("demo.Other")));
    }
}

//! Service collection: the mutable registration table
//!
//! Startup configuration code populates a [`ServiceCollection`], then hands
//! it to the provider with [`build`](ServiceCollection::build). The build
//! call consumes the collection, so no registration can be added or changed
//! once the provider exists.
//!
//! # Example
//!
//! ```rust,ignore
//! use armature::{binding, Binding, ServiceCollection};
//!
//! let mut services = ServiceCollection::new();
//! services.add_instance(AppConfig::from_env());
//! services.add_singleton(binding!(CacheClient, { config: AppConfig } => CacheClient::new))?;
//! services.add_transient(binding!(SyncWorker, { cache: CacheClient } => SyncWorker::new))?;
//!
//! let provider = services.build()?;
//! ```

use std::collections::HashMap;

use tracing::debug;

use crate::dependency::{Binding, Lifetime, Registration, ServiceKey};
use crate::error::ContainerError;
use crate::provider::ServiceProvider;

/// The mutable registration table built during startup configuration
///
/// One registration per service key; registering the same key again
/// replaces the previous binding (last registration wins).
#[derive(Default)]
pub struct ServiceCollection {
    container: HashMap<ServiceKey, Registration>,
}

impl ServiceCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding with singleton lifetime
    ///
    /// Constructor bindings are instantiated eagerly during the build
    /// phase; factory bindings run once with the provider as argument.
    pub fn add_singleton(&mut self, binding: Binding) -> Result<(), ContainerError> {
        self.register(binding, Lifetime::Singleton)
    }

    /// Register a binding with transient lifetime
    ///
    /// A fresh instance is activated on every resolution. Factory bindings
    /// are not supported for transients.
    pub fn add_transient(&mut self, binding: Binding) -> Result<(), ContainerError> {
        if binding.is_factory() {
            return Err(ContainerError::configuration(
                binding.key().type_name(),
                "transient bindings cannot use a factory",
            ));
        }
        self.register(binding, Lifetime::Transient)
    }

    /// Register a pre-built instance as a singleton
    ///
    /// The registration is considered already built and carries no
    /// constructor parameters.
    pub fn add_instance<T: Send + Sync + 'static>(&mut self, value: T) {
        let registration = Registration::from_instance(value);
        debug!(service = registration.type_name(), "registered instance");
        self.container.insert(registration.key(), registration);
    }

    /// Register a factory as a singleton
    ///
    /// Shorthand for `add_singleton(Binding::factory(f))`. The factory runs
    /// once during the build phase and receives the provider itself; use
    /// [`Binding::factory`] directly when the factory needs `after` gates.
    pub fn add_factory<T, F>(&mut self, factory: F) -> Result<(), ContainerError>
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        self.register(Binding::factory(factory), Lifetime::Singleton)
    }

    fn register(&mut self, binding: Binding, lifetime: Lifetime) -> Result<(), ContainerError> {
        let registration = Registration::from_binding(binding, lifetime)?;
        debug!(
            service = registration.type_name(),
            lifetime = %registration.lifetime(),
            factory = registration.is_factory(),
            "registered"
        );
        self.container.insert(registration.key(), registration);
        Ok(())
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.container.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.container.is_empty()
    }

    /// Consume the collection and build the provider
    ///
    /// Eagerly instantiates every singleton and factory in dependency
    /// order; see [`ServiceProvider`] for the build algorithm and its
    /// error conditions.
    pub fn build(self) -> Result<ServiceProvider, ContainerError> {
        ServiceProvider::build(self.container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding;
    use pretty_assertions::assert_eq;

    struct Config {
        url: String,
    }

    struct Client {
        #[allow(dead_code)]
        config: std::sync::Arc<Config>,
    }

    #[test]
    fn test_add_and_len() {
        let mut services = ServiceCollection::new();
        assert!(services.is_empty());

        services.add_instance(Config {
            url: "mongodb://localhost".into(),
        });
        services
            .add_singleton(binding!(Client, { config: Config } => |config| Client { config }))
            .unwrap();

        assert_eq!(services.len(), 2);
    }

    #[test]
    fn test_last_registration_wins() {
        let mut services = ServiceCollection::new();
        services.add_instance(Config { url: "first".into() });
        services.add_instance(Config { url: "second".into() });
        assert_eq!(services.len(), 1);

        let provider = services.build().unwrap();
        let config = provider.resolve::<Config>().unwrap();
        assert_eq!(config.url, "second");
    }

    #[test]
    fn test_transient_factory_rejected() {
        let mut services = ServiceCollection::new();
        let err = services
            .add_transient(Binding::factory(|_| Ok(Config { url: "x".into() })))
            .unwrap_err();
        assert!(matches!(err, ContainerError::Configuration { .. }));
    }

    #[test]
    fn test_duplicate_dependency_name_rejected_at_add_time() {
        let mut services = ServiceCollection::new();
        let binding = Binding::of::<Client>()
            .depends_on::<Config>("config")
            .depends_on::<Config>("config")
            .construct(|args| {
                Ok(Client {
                    config: args.arg::<Config>("config")?,
                })
            });

        let err = services.add_singleton(binding).unwrap_err();
        assert!(matches!(err, ContainerError::Configuration { .. }));
        assert!(services.is_empty());
    }
}

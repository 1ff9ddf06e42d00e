//! Armature: an eager, lifetime-checked dependency injection container
//!
//! Armature wires an application's service graph at process start and then
//! gets out of the way:
//!
//! - **Singletons**: built exactly once, in dependency order, before any
//!   traffic is accepted; shared for the process lifetime.
//! - **Transients**: activated fresh on every resolution.
//! - **Factories**: singletons whose construction delegates to a closure
//!   receiving the whole provider.
//! - **Lifetime safety**: a singleton may never depend, transitively, on a
//!   transient; the build fails instead of capturing per-resolution state
//!   in a process-lifetime instance.
//! - **Deterministic failure**: missing registrations, singleton cycles,
//!   and lifetime violations abort the build with an error naming the
//!   types involved.
//!
//! # Example
//!
//! ```rust,ignore
//! use armature::{binding, Ambient, ServiceCollection};
//!
//! let mut services = ServiceCollection::new();
//! services.add_instance(AppConfig::from_env());
//! services.add_singleton(binding!(MongoClient, { config: AppConfig } => MongoClient::new))?;
//! services.add_singleton(binding!(FitnessRepository, {
//!     client: MongoClient,
//! } => FitnessRepository::new))?;
//! services.add_transient(binding!(SyncRequest, {
//!     repository: FitnessRepository,
//! } => SyncRequest::new))?;
//!
//! let provider = std::sync::Arc::new(services.build()?);
//! Ambient::bind(provider.clone());
//!
//! // in request-handling code, for the rest of the process lifetime:
//! let repository = Ambient::resolve::<FitnessRepository>()?;
//! let request = provider.resolve::<SyncRequest>()?;
//! ```
//!
//! Dependencies are declared explicitly on the binding, so a dependency
//! without a concrete type is a compile error, and the whole graph is
//! validated before the first instance is handed out.

pub mod ambient;
pub mod collection;
pub mod dependency;
pub mod error;
pub mod provider;
pub mod testing;

pub use ambient::{bootstrap, with_provider, with_provider_async, Ambient, RegistrationEntry};
pub use collection::ServiceCollection;
pub use dependency::{
    Activation, Binding, BindingBuilder, Dependency, Instance, Lifetime, Registration, ServiceKey,
};
pub use error::ContainerError;
pub use provider::ServiceProvider;

// Re-exported for the register_services! macro expansion
#[doc(hidden)]
pub use inventory;

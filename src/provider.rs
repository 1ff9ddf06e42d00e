//! Service provider: the build engine and runtime resolver
//!
//! The provider consumes a finished [`ServiceCollection`] and eagerly
//! instantiates every singleton and factory in dependency order. The build
//! runs to a fixed point: each pass activates every registration whose
//! dependencies are already built, and a pass that makes no progress while
//! registrations remain unbuilt means the graph is unsatisfiable.
//!
//! Singletons form a DAG by construction: a singleton may never require a
//! transient (the lifetime safety rule), and cycles among singletons are
//! rejected by the progress-or-fail loop. The repeated-pass strategy is a
//! plain topological build, worst case O(N²) passes for N registrations;
//! N is the process-lifetime service count, so this never matters.
//!
//! After a successful build the provider is immutable and
//! [`resolve`](ServiceProvider::resolve) is safe to call from any number of
//! concurrent tasks: singletons are reads of the built table, transients
//! allocate fresh state per call.
//!
//! [`ServiceCollection`]: crate::ServiceCollection

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::dependency::{Activation, Instance, Lifetime, Registration, ServiceKey};
use crate::error::ContainerError;

/// The built dependency graph, ready for runtime resolution
///
/// Created by [`ServiceCollection::build`]; the type only exists once every
/// singleton and factory has an instance, so resolving a singleton from a
/// provider you hold is always a cache hit. The one exception is a factory
/// running *during* the build phase: it receives the provider early and
/// gets [`ContainerError::NotBuilt`] for singletons it did not declare with
/// [`Binding::after`].
///
/// [`ServiceCollection::build`]: crate::ServiceCollection::build
/// [`Binding::after`]: crate::Binding::after
pub struct ServiceProvider {
    registrations: HashMap<ServiceKey, Registration>,
    built: RwLock<HashMap<ServiceKey, Instance>>,
}

impl ServiceProvider {
    /// Build the graph from a finished registration table
    pub(crate) fn build(
        registrations: HashMap<ServiceKey, Registration>,
    ) -> Result<Self, ContainerError> {
        let provider = Self {
            registrations,
            built: RwLock::new(HashMap::new()),
        };
        provider.build_graph()?;
        Ok(provider)
    }

    fn build_graph(&self) -> Result<(), ContainerError> {
        let start = Instant::now();

        let mut singletons = Vec::new();
        let mut factories = Vec::new();
        {
            let mut built = self.built_mut();
            for registration in self.registrations.values() {
                match registration.lifetime() {
                    Lifetime::Transient => continue,
                    Lifetime::Singleton if registration.is_factory() => {
                        factories.push(registration.key());
                    }
                    Lifetime::Singleton => {
                        singletons.push(registration.key());
                        // Pre-supplied instances count as built from the start
                        if let Some(instance) = registration.instance() {
                            built.insert(registration.key(), Arc::clone(instance));
                        }
                    }
                }
            }
        }

        let to_instantiate = singletons.len() + factories.len();

        while self.built_count() < to_instantiate {
            let before = self.built_count();

            self.singleton_pass(&singletons)?;
            self.factory_pass(&factories)?;

            if self.built_count() == before {
                let unbuilt: Vec<&'static str> = singletons
                    .iter()
                    .chain(factories.iter())
                    .filter(|key| !self.is_built(**key))
                    .map(|key| key.type_name())
                    .collect();
                return Err(ContainerError::BuildDeadlock {
                    remaining: unbuilt.len(),
                    unbuilt,
                });
            }
        }

        info!(
            services = to_instantiate,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "service provider built"
        );
        Ok(())
    }

    /// Activate every not-yet-built singleton whose dependencies are ready
    fn singleton_pass(&self, singletons: &[ServiceKey]) -> Result<(), ContainerError> {
        for &key in singletons {
            if self.is_built(key) {
                continue;
            }
            let Some(registration) = self.registrations.get(&key) else {
                continue;
            };

            // Zero-param singletons activate unconditionally
            if !registration.dependencies().is_empty() && !self.can_build(registration)? {
                continue;
            }

            let args = self.built_arguments(registration);
            debug!(service = registration.type_name(), "building singleton");
            let instance =
                registration.activate(Activation::new(registration.type_name(), args))?;
            self.built_mut().insert(key, instance);
        }
        Ok(())
    }

    /// Invoke every not-yet-built factory whose readiness gates are built
    fn factory_pass(&self, factories: &[ServiceKey]) -> Result<(), ContainerError> {
        for &key in factories {
            if self.is_built(key) {
                continue;
            }
            let Some(registration) = self.registrations.get(&key) else {
                continue;
            };

            let mut ready = true;
            for gate in registration.gates() {
                let gate_registration = self.registrations.get(gate).ok_or_else(|| {
                    ContainerError::missing_registration(
                        gate.type_name(),
                        Some(registration.type_name()),
                    )
                })?;
                if gate_registration.lifetime() == Lifetime::Transient {
                    return Err(ContainerError::configuration(
                        registration.type_name(),
                        format!(
                            "factory gate '{}' is transient and will never be built",
                            gate.type_name()
                        ),
                    ));
                }
                if !self.is_built(*gate) {
                    ready = false;
                    break;
                }
            }
            if !ready {
                continue;
            }

            debug!(service = registration.type_name(), "building factory singleton");
            let instance = registration.run_factory(self)?;
            self.built_mut().insert(key, instance);
        }
        Ok(())
    }

    /// Whether a singleton can be activated this pass
    ///
    /// The whole dependency list is verified first, so a violation is
    /// raised even when an earlier dependency is still unbuilt; only then
    /// does an unbuilt dependency defer (return false) to the next pass.
    fn can_build(&self, registration: &Registration) -> Result<bool, ContainerError> {
        self.verify_singleton(registration)?;

        for dep in registration.dependencies() {
            if !self.is_built(dep.key) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Check every required registration exists and none is transient
    ///
    /// Independent of build progress: a missing registration or a
    /// transient in the list is fatal immediately, never deferred.
    fn verify_singleton(&self, registration: &Registration) -> Result<(), ContainerError> {
        for dep in registration.dependencies() {
            let dep_registration = self.registrations.get(&dep.key).ok_or_else(|| {
                ContainerError::missing_registration(
                    dep.key.type_name(),
                    Some(registration.type_name()),
                )
            })?;

            if dep_registration.lifetime() == Lifetime::Transient {
                return Err(ContainerError::LifetimeViolation {
                    singleton: registration.type_name(),
                    dependency: dep.key.type_name(),
                });
            }
        }
        Ok(())
    }

    /// Collect the built instances for a registration's dependencies
    fn built_arguments(&self, registration: &Registration) -> HashMap<&'static str, Instance> {
        let built = self.built_ref();
        registration
            .dependencies()
            .iter()
            .filter_map(|dep| built.get(&dep.key).map(|inst| (dep.name, Arc::clone(inst))))
            .collect()
    }

    /// Resolve a registered service as an `Arc<T>`
    ///
    /// Singletons return the shared built instance; transients activate a
    /// fresh instance, recursively resolving their constructor dependencies
    /// through the same table.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        let start = Instant::now();
        let key = ServiceKey::of::<T>();

        let instance = self.resolve_key(key, None, &mut Vec::new())?;
        trace!(
            service = key.type_name(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "resolved"
        );

        instance.downcast::<T>().map_err(|_| {
            ContainerError::configuration(key.type_name(), "registered instance has a different type")
        })
    }

    /// Whether a service type is registered
    pub fn has<T: Send + Sync + 'static>(&self) -> bool {
        self.registrations.contains_key(&ServiceKey::of::<T>())
    }

    /// Number of registrations (all lifetimes)
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether the provider holds no registrations
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Type-erased resolution with the in-progress chain guard
    ///
    /// The chain tracks transient activations in the current call only, so
    /// concurrent resolutions never observe each other.
    fn resolve_key(
        &self,
        key: ServiceKey,
        requested_by: Option<&'static str>,
        chain: &mut Vec<ServiceKey>,
    ) -> Result<Instance, ContainerError> {
        let registration = self
            .registrations
            .get(&key)
            .ok_or_else(|| ContainerError::missing_registration(key.type_name(), requested_by))?;

        match registration.lifetime() {
            Lifetime::Singleton => self
                .built_ref()
                .get(&key)
                .cloned()
                .ok_or(ContainerError::NotBuilt {
                    type_name: key.type_name(),
                }),
            Lifetime::Transient => {
                if chain.contains(&key) {
                    let mut names: Vec<&'static str> =
                        chain.iter().map(|k| k.type_name()).collect();
                    names.push(key.type_name());
                    return Err(ContainerError::CircularResolution { chain: names });
                }
                chain.push(key);

                let mut args = HashMap::with_capacity(registration.dependencies().len());
                for dep in registration.dependencies() {
                    let instance =
                        self.resolve_key(dep.key, Some(registration.type_name()), chain)?;
                    args.insert(dep.name, instance);
                }
                chain.pop();

                registration.activate(Activation::new(registration.type_name(), args))
            }
        }
    }

    fn built_ref(&self) -> RwLockReadGuard<'_, HashMap<ServiceKey, Instance>> {
        self.built.read().unwrap_or_else(|e| e.into_inner())
    }

    fn built_mut(&self) -> RwLockWriteGuard<'_, HashMap<ServiceKey, Instance>> {
        self.built.write().unwrap_or_else(|e| e.into_inner())
    }

    fn built_count(&self) -> usize {
        self.built_ref().len()
    }

    fn is_built(&self, key: ServiceKey) -> bool {
        self.built_ref().contains_key(&key)
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("registrations", &self.registrations.len())
            .field("built", &self.built_count())
            .finish()
    }
}

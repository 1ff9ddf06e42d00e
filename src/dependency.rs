//! Registration metadata and the binding builder
//!
//! A [`Binding`] declares how one service type is constructed: its
//! constructor dependencies (name + type, in declaration order) and either a
//! constructor closure or a factory. The [`ServiceCollection`] turns
//! bindings into [`Registration`]s, which the provider activates during the
//! build phase.
//!
//! Constructor dependencies are declared explicitly with
//! [`BindingBuilder::depends_on`], so a dependency without a concrete type
//! is a compile error rather than a runtime one.
//!
//! # Example
//!
//! ```rust,ignore
//! use armature::{Binding, ServiceCollection};
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton(
//!     Binding::of::<UserService>()
//!         .depends_on::<Database>("db")
//!         .construct(|args| Ok(UserService::new(args.arg::<Database>("db")?))),
//! )?;
//! ```
//!
//! [`ServiceCollection`]: crate::ServiceCollection

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::ContainerError;
use crate::provider::ServiceProvider;

/// Type alias for a type-erased service instance
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Type alias for a type-erased constructor closure
pub(crate) type ConstructorFn =
    Arc<dyn Fn(&Activation) -> Result<Instance, ContainerError> + Send + Sync>;

/// Type alias for a type-erased factory closure
pub(crate) type FactoryFn =
    Arc<dyn Fn(&ServiceProvider) -> Result<Instance, ContainerError> + Send + Sync>;

/// Unique identifier for a registered service type
///
/// Wraps the `TypeId` together with the type name so diagnostics can name
/// types without a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    id: TypeId,
    name: &'static str,
}

impl ServiceKey {
    /// The key for a service type
    pub fn of<T: Send + Sync + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The full type name behind this key
    pub fn type_name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Service lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Built once during the provider build phase, shared for the process
    Singleton,
    /// Built anew on every resolution
    Transient,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singleton => write!(f, "singleton"),
            Self::Transient => write!(f, "transient"),
        }
    }
}

/// One declared constructor dependency: parameter name plus required type
#[derive(Debug, Clone, Copy)]
pub struct Dependency {
    /// Constructor parameter name, used to look the argument up at activation
    pub name: &'static str,
    /// The service type the parameter requires
    pub key: ServiceKey,
}

/// Resolved constructor arguments handed to a constructor closure
///
/// Holds one instance per declared dependency, keyed by parameter name.
/// Requesting an undeclared name or the wrong type is a configuration
/// error naming the service being activated.
pub struct Activation {
    type_name: &'static str,
    args: HashMap<&'static str, Instance>,
}

impl Activation {
    pub(crate) fn new(type_name: &'static str, args: HashMap<&'static str, Instance>) -> Self {
        Self { type_name, args }
    }

    /// Take the argument declared under `name` as an `Arc<T>`
    pub fn arg<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ContainerError> {
        let instance = self.args.get(name).ok_or_else(|| {
            ContainerError::configuration(
                self.type_name,
                format!("constructor requested undeclared argument '{name}'"),
            )
        })?;

        Arc::clone(instance).downcast::<T>().map_err(|_| {
            ContainerError::configuration(
                self.type_name,
                format!(
                    "argument '{name}' is not of type {}",
                    std::any::type_name::<T>()
                ),
            )
        })
    }
}

/// Builder for a constructor binding
///
/// Created by [`Binding::of`]; finished by [`construct`](Self::construct).
/// Dependencies are recorded in declaration order, which is also the order
/// the provider supplies them during activation.
pub struct BindingBuilder<T> {
    key: ServiceKey,
    dependencies: Vec<Dependency>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> BindingBuilder<T> {
    /// Declare a constructor dependency with its parameter name
    pub fn depends_on<D: Send + Sync + 'static>(mut self, name: &'static str) -> Self {
        self.dependencies.push(Dependency {
            name,
            key: ServiceKey::of::<D>(),
        });
        self
    }

    /// Supply the constructor closure, completing the binding
    ///
    /// The closure receives the resolved arguments and returns the new
    /// instance; report domain failures with
    /// [`ContainerError::activation`].
    pub fn construct<F>(self, ctor: F) -> Binding
    where
        F: Fn(&Activation) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        let erased: ConstructorFn =
            Arc::new(move |args| Ok(Arc::new(ctor(args)?) as Instance));
        Binding {
            key: self.key,
            dependencies: self.dependencies,
            gates: Vec::new(),
            constructor: Some(erased),
            factory: None,
        }
    }
}

/// A completed binding declaration, ready to be registered
///
/// Either a constructor binding (built from declared dependencies) or a
/// factory binding (activation delegated to a closure receiving the whole
/// provider).
pub struct Binding {
    key: ServiceKey,
    dependencies: Vec<Dependency>,
    gates: Vec<ServiceKey>,
    constructor: Option<ConstructorFn>,
    factory: Option<FactoryFn>,
}

impl Binding {
    /// Start a constructor binding for a service type
    pub fn of<T: Send + Sync + 'static>() -> BindingBuilder<T> {
        BindingBuilder {
            key: ServiceKey::of::<T>(),
            dependencies: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Create a factory binding
    ///
    /// The factory runs once during the build phase and receives the
    /// provider itself; it carries no constructor parameters. Order it
    /// after the singletons it resolves with [`after`](Self::after).
    pub fn factory<T, F>(factory: F) -> Binding
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        let erased: FactoryFn =
            Arc::new(move |provider| Ok(Arc::new(factory(provider)?) as Instance));
        Binding {
            key: ServiceKey::of::<T>(),
            dependencies: Vec::new(),
            gates: Vec::new(),
            constructor: None,
            factory: Some(erased),
        }
    }

    /// Declare a readiness gate for a factory binding
    ///
    /// The factory is not invoked until the gated singleton is built, so it
    /// can resolve it safely. Only valid on factory bindings.
    pub fn after<D: Send + Sync + 'static>(mut self) -> Self {
        self.gates.push(ServiceKey::of::<D>());
        self
    }

    pub(crate) fn is_factory(&self) -> bool {
        self.factory.is_some()
    }

    pub(crate) fn key(&self) -> ServiceKey {
        self.key
    }
}

/// Stored binding of a service type to how it is built
///
/// Created once by the [`ServiceCollection`] and never mutated afterward;
/// instances produced during the build phase live in the provider's built
/// table, not here.
///
/// [`ServiceCollection`]: crate::ServiceCollection
pub struct Registration {
    key: ServiceKey,
    lifetime: Lifetime,
    dependencies: Vec<Dependency>,
    gates: Vec<ServiceKey>,
    constructor: Option<ConstructorFn>,
    factory: Option<FactoryFn>,
    instance: Option<Instance>,
}

impl Registration {
    /// Validate a binding and attach its lifetime
    pub(crate) fn from_binding(
        binding: Binding,
        lifetime: Lifetime,
    ) -> Result<Self, ContainerError> {
        let mut seen = Vec::with_capacity(binding.dependencies.len());
        for dep in &binding.dependencies {
            if seen.contains(&dep.name) {
                return Err(ContainerError::configuration(
                    binding.key.type_name(),
                    format!("dependency '{}' declared more than once", dep.name),
                ));
            }
            seen.push(dep.name);
        }

        if binding.constructor.is_some() && !binding.gates.is_empty() {
            return Err(ContainerError::configuration(
                binding.key.type_name(),
                "readiness gates are only valid on factory bindings",
            ));
        }

        Ok(Self {
            key: binding.key,
            lifetime,
            dependencies: binding.dependencies,
            gates: binding.gates,
            constructor: binding.constructor,
            factory: binding.factory,
            instance: None,
        })
    }

    /// A registration for a pre-built instance (already built, no params)
    pub(crate) fn from_instance<T: Send + Sync + 'static>(value: T) -> Self {
        let instance: Instance = Arc::new(value);
        Self {
            key: ServiceKey::of::<T>(),
            lifetime: Lifetime::Singleton,
            dependencies: Vec::new(),
            gates: Vec::new(),
            constructor: None,
            factory: None,
            instance: Some(instance),
        }
    }

    /// The key this registration is stored under
    pub fn key(&self) -> ServiceKey {
        self.key
    }

    /// The implementation type name, for diagnostics
    pub fn type_name(&self) -> &'static str {
        self.key.type_name()
    }

    /// The registered lifetime
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Declared constructor dependencies, in declaration order
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Declared factory readiness gates
    pub fn gates(&self) -> &[ServiceKey] {
        &self.gates
    }

    /// Whether activation delegates to a factory
    pub fn is_factory(&self) -> bool {
        self.factory.is_some()
    }

    /// The pre-supplied instance, if this registration carries one
    pub(crate) fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    /// Run the constructor with resolved arguments
    pub(crate) fn activate(&self, args: Activation) -> Result<Instance, ContainerError> {
        let ctor = self.constructor.as_ref().ok_or_else(|| {
            ContainerError::configuration(self.key.type_name(), "registration has no constructor")
        })?;
        ctor(&args)
    }

    /// Run the factory against the provider
    pub(crate) fn run_factory(
        &self,
        provider: &ServiceProvider,
    ) -> Result<Instance, ContainerError> {
        let factory = self.factory.as_ref().ok_or_else(|| {
            ContainerError::configuration(self.key.type_name(), "registration has no factory")
        })?;
        factory(provider)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("lifetime", &self.lifetime)
            .field("dependencies", &self.dependencies)
            .field("is_factory", &self.is_factory())
            .finish()
    }
}

/// Build a [`Binding`] from a constructor function and its dependency list
///
/// The constructor receives one `Arc` argument per declared dependency, in
/// declaration order:
///
/// ```rust,ignore
/// services.add_singleton(binding!(CacheClient => CacheClient::connect))?;
/// services.add_singleton(binding!(FitnessService, {
///     repository: FitnessRepository,
///     cache: CacheClient,
/// } => FitnessService::new))?;
/// ```
#[macro_export]
macro_rules! binding {
    ($ty:ty => $ctor:expr) => {
        $crate::Binding::of::<$ty>().construct(move |_args| Ok(($ctor)()))
    };
    ($ty:ty, { $($name:ident: $dep:ty),+ $(,)? } => $ctor:expr) => {
        $crate::Binding::of::<$ty>()
            $(.depends_on::<$dep>(stringify!($name)))+
            .construct(move |args| {
                Ok(($ctor)($(args.arg::<$dep>(stringify!($name))?),+))
            })
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct Database;
    #[derive(Debug)]
    struct UserService {
        #[allow(dead_code)]
        db: Arc<Database>,
    }

    #[test]
    fn test_service_key_identity() {
        assert_eq!(ServiceKey::of::<Database>(), ServiceKey::of::<Database>());
        assert_ne!(ServiceKey::of::<Database>(), ServiceKey::of::<UserService>());
        assert!(ServiceKey::of::<Database>().type_name().contains("Database"));
    }

    #[test]
    fn test_builder_records_dependencies_in_order() {
        let binding = Binding::of::<UserService>()
            .depends_on::<Database>("db")
            .depends_on::<String>("label")
            .construct(|args| {
                Ok(UserService {
                    db: args.arg::<Database>("db")?,
                })
            });

        let registration =
            Registration::from_binding(binding, Lifetime::Singleton).unwrap();
        let names: Vec<_> = registration.dependencies().iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["db", "label"]);
        assert!(!registration.is_factory());
    }

    #[test]
    fn test_duplicate_dependency_name_is_configuration_error() {
        let binding = Binding::of::<UserService>()
            .depends_on::<Database>("db")
            .depends_on::<Database>("db")
            .construct(|args| {
                Ok(UserService {
                    db: args.arg::<Database>("db")?,
                })
            });

        let err = Registration::from_binding(binding, Lifetime::Singleton).unwrap_err();
        assert!(matches!(err, ContainerError::Configuration { .. }));
    }

    #[test]
    fn test_gates_rejected_on_constructor_bindings() {
        let binding = Binding::of::<Database>()
            .construct(|_| Ok(Database))
            .after::<UserService>();

        let err = Registration::from_binding(binding, Lifetime::Singleton).unwrap_err();
        assert!(matches!(err, ContainerError::Configuration { .. }));
    }

    #[test]
    fn test_activation_rejects_undeclared_argument() {
        let activation = Activation::new("UserService", HashMap::new());
        let err = activation.arg::<Database>("db").unwrap_err();
        assert!(matches!(err, ContainerError::Configuration { .. }));
    }

    #[test]
    fn test_activation_rejects_wrong_type() {
        let mut args: HashMap<&'static str, Instance> = HashMap::new();
        args.insert("db", Arc::new(Database));

        let activation = Activation::new("UserService", args);
        assert!(activation.arg::<Database>("db").is_ok());
        assert!(matches!(
            activation.arg::<UserService>("db").unwrap_err(),
            ContainerError::Configuration { .. }
        ));
    }

    #[test]
    fn test_binding_macro_zero_dependencies() {
        let binding = binding!(Database => || Database);
        let registration =
            Registration::from_binding(binding, Lifetime::Singleton).unwrap();
        assert!(registration.dependencies().is_empty());

        let instance = registration.activate(Activation::new("Database", HashMap::new()));
        assert!(instance.is_ok());
    }

    #[test]
    fn test_binding_macro_with_dependencies() {
        let binding = binding!(UserService, { db: Database } => |db| UserService { db });
        let registration =
            Registration::from_binding(binding, Lifetime::Transient).unwrap();

        let names: Vec<_> = registration.dependencies().iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["db"]);

        let mut args: HashMap<&'static str, Instance> = HashMap::new();
        args.insert("db", Arc::new(Database));
        let instance = registration
            .activate(Activation::new("UserService", args))
            .unwrap();
        assert!(instance.downcast::<UserService>().is_ok());
    }
}

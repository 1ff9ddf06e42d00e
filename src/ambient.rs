//! Process-wide provider handle and startup composition
//!
//! [`Ambient`] holds exactly one built [`ServiceProvider`] for the life of
//! the process. [`Ambient::bind`] is first-writer-wins: the slot is set
//! once at startup, read-only thereafter, and later bind attempts are
//! no-ops.
//!
//! Request handlers opt into resolution through an explicit signature
//! rather than parameter-name sniffing: write the handler to accept
//! `Arc<ServiceProvider>` and adapt it with [`with_provider`] (or
//! [`with_provider_async`]), which supplies the ambient provider at call
//! time.
//!
//! Startup composition uses `inventory`: modules submit a
//! [`RegistrationEntry`] with [`register_services!`], and [`bootstrap`]
//! collects every entry into one [`ServiceCollection`], builds the
//! provider, and binds it ambiently.
//!
//! # Example
//!
//! ```rust,ignore
//! use armature::{binding, register_services, Ambient};
//!
//! register_services!("fitness", |services| {
//!     services.add_singleton(binding!(FitnessService, {
//!         repository: FitnessRepository,
//!     } => FitnessService::new))
//! });
//!
//! // at process start, before accepting traffic:
//! let provider = armature::bootstrap()?;
//!
//! // anywhere afterwards:
//! let service = Ambient::resolve::<FitnessService>()?;
//! ```
//!
//! [`ServiceCollection`]: crate::ServiceCollection

use std::future::Future;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use crate::collection::ServiceCollection;
use crate::error::ContainerError;
use crate::provider::ServiceProvider;

/// Global provider slot, set once by the first `bind`
static AMBIENT_PROVIDER: OnceLock<Arc<ServiceProvider>> = OnceLock::new();

/// Process-wide accessor for the one built provider
pub struct Ambient;

impl Ambient {
    /// Bind the provider into the process-wide slot
    ///
    /// First writer wins; subsequent calls are no-ops, not errors.
    pub fn bind(provider: Arc<ServiceProvider>) {
        if AMBIENT_PROVIDER.set(provider).is_ok() {
            info!("ambient service provider bound");
        }
    }

    /// The bound provider, if any
    ///
    /// A thread-local override installed by
    /// [`testing::TestProvider`](crate::testing::TestProvider) takes
    /// precedence, so tests never observe each other's wiring.
    pub fn provider() -> Option<Arc<ServiceProvider>> {
        if let Some(provider) = crate::testing::thread_override() {
            return Some(provider);
        }
        AMBIENT_PROVIDER.get().cloned()
    }

    /// Whether a provider is bound (or overridden on this thread)
    pub fn is_bound() -> bool {
        Self::provider().is_some()
    }

    /// Resolve through the bound provider
    pub fn resolve<T: Send + Sync + 'static>() -> Result<Arc<T>, ContainerError> {
        Self::provider()
            .ok_or(ContainerError::AmbientUnbound)?
            .resolve::<T>()
    }
}

/// Adapt a handler that explicitly accepts the provider
///
/// The returned closure takes the handler's own argument and supplies the
/// ambient provider as the second parameter; calling it before
/// [`Ambient::bind`] yields [`ContainerError::AmbientUnbound`].
///
/// ```rust,ignore
/// fn list_workouts(user: UserId, provider: Arc<ServiceProvider>) -> Vec<Workout> { ... }
///
/// let handler = with_provider(list_workouts);
/// let workouts = handler(user_id)?;
/// ```
pub fn with_provider<F, A, R>(handler: F) -> impl Fn(A) -> Result<R, ContainerError>
where
    F: Fn(A, Arc<ServiceProvider>) -> R,
{
    move |arg| {
        let provider = Ambient::provider().ok_or(ContainerError::AmbientUnbound)?;
        Ok(handler(arg, provider))
    }
}

/// Adapt an async handler that explicitly accepts the provider
///
/// Same contract as [`with_provider`]; the ambient lookup happens before
/// the future is created, so an unbound ambient fails eagerly.
///
/// ```rust,ignore
/// async fn sync_steps(day: Date, provider: Arc<ServiceProvider>) -> SyncReport { ... }
///
/// let handler = with_provider_async(sync_steps);
/// let report = handler(today)?.await;
/// ```
pub fn with_provider_async<F, A, Fut>(handler: F) -> impl Fn(A) -> Result<Fut, ContainerError>
where
    F: Fn(A, Arc<ServiceProvider>) -> Fut,
    Fut: Future,
{
    move |arg| {
        let provider = Ambient::provider().ok_or(ContainerError::AmbientUnbound)?;
        Ok(handler(arg, provider))
    }
}

/// Entry for inventory-collected service registrations
///
/// Submitted by the [`register_services!`] macro; collected by
/// [`bootstrap`] in link order.
pub struct RegistrationEntry {
    /// Module name for startup logging
    pub name: &'static str,
    /// Populates one module's registrations
    pub register: fn(&mut ServiceCollection) -> Result<(), ContainerError>,
}

inventory::collect!(RegistrationEntry);

/// Collect every submitted registration entry, build, and bind
///
/// Call once at process startup, before accepting traffic. Returns the
/// built provider; any registration or build failure aborts startup.
pub fn bootstrap() -> Result<Arc<ServiceProvider>, ContainerError> {
    let mut services = ServiceCollection::new();

    for entry in inventory::iter::<RegistrationEntry> {
        debug!(module = entry.name, "collecting registrations");
        (entry.register)(&mut services)?;
    }

    let provider = Arc::new(services.build()?);
    Ambient::bind(Arc::clone(&provider));
    Ok(provider)
}

/// Submit a module's service registrations for [`bootstrap`]
///
/// ```rust,ignore
/// register_services!("google-fit", |services| {
///     services.add_singleton(binding!(GoogleFitClient, {
///         auth: GoogleAuthService,
///     } => GoogleFitClient::new))
/// });
/// ```
#[macro_export]
macro_rules! register_services {
    ($name:expr, $register:expr) => {
        $crate::inventory::submit! {
            $crate::RegistrationEntry {
                name: $name,
                register: $register,
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestProvider;
    use pretty_assertions::assert_eq;

    struct Greeter {
        prefix: String,
    }

    fn greeter_provider(prefix: &str) -> Arc<ServiceProvider> {
        let mut services = ServiceCollection::new();
        services.add_instance(Greeter {
            prefix: prefix.into(),
        });
        Arc::new(services.build().unwrap())
    }

    #[test]
    fn test_thread_override_resolves() {
        let _guard = TestProvider::bind(greeter_provider("hello"));

        let greeter = Ambient::resolve::<Greeter>().unwrap();
        assert_eq!(greeter.prefix, "hello");
        assert!(Ambient::is_bound());
    }

    #[test]
    fn test_with_provider_supplies_ambient() {
        let _guard = TestProvider::bind(greeter_provider("hi"));

        let handler = with_provider(|name: &str, provider: Arc<ServiceProvider>| {
            let greeter = provider.resolve::<Greeter>().unwrap();
            format!("{} {}", greeter.prefix, name)
        });

        assert_eq!(handler("runner").unwrap(), "hi runner");
    }

    #[tokio::test]
    async fn test_with_provider_async_supplies_ambient() {
        let _guard = TestProvider::bind(greeter_provider("hey"));

        let handler = with_provider_async(|name: String, provider: Arc<ServiceProvider>| {
            async move {
                let greeter = provider.resolve::<Greeter>().unwrap();
                format!("{} {}", greeter.prefix, name)
            }
        });

        let greeting = handler("cyclist".to_string()).unwrap().await;
        assert_eq!(greeting, "hey cyclist");
    }

    #[test]
    fn test_adapter_without_binding_is_unbound_error() {
        // No override on this thread, and the process-wide slot is left
        // untouched by every test except test_global_bind_first_wins, which
        // runs in its own dedicated thread check below. Guard anyway.
        let handler = with_provider(|(): (), _provider| ());

        std::thread::spawn(move || {
            if Ambient::provider().is_none() {
                assert!(matches!(handler(()), Err(ContainerError::AmbientUnbound)));
            }
        })
        .join()
        .unwrap();
    }

    struct BootMarker {
        module: &'static str,
    }

    register_services!("ambient-tests", |services| {
        services.add_instance(BootMarker {
            module: "ambient-tests",
        });
        Ok(())
    });

    // The only test that touches the process-wide slot; everything else
    // goes through the thread-local override.
    #[test]
    fn test_bootstrap_binds_and_first_bind_wins() {
        let provider = bootstrap().unwrap();
        let marker = provider.resolve::<BootMarker>().unwrap();
        assert_eq!(marker.module, "ambient-tests");

        // Later binds are no-ops, first writer wins
        Ambient::bind(greeter_provider("late"));
        let bound = AMBIENT_PROVIDER.get().unwrap();
        assert!(bound.has::<BootMarker>());
        assert!(!bound.has::<Greeter>());
    }
}

//! Test support for ambient resolution
//!
//! The process-wide [`Ambient`](crate::Ambient) slot is set once and never
//! replaced, which would make tests that exercise ambient resolution step
//! on each other. [`TestProvider`] installs a thread-local override that
//! takes precedence over the global slot and is removed when the returned
//! guard drops, so each test wires its own provider in isolation.
//!
//! # Example
//!
//! ```rust,ignore
//! use armature::testing::TestProvider;
//!
//! let _guard = TestProvider::bind(Arc::new(services.build()?));
//! let service = Ambient::resolve::<FitnessService>()?;
//! ```

use std::cell::RefCell;
use std::sync::Arc;

use crate::provider::ServiceProvider;

thread_local! {
    static OVERRIDE_PROVIDER: RefCell<Option<Arc<ServiceProvider>>> = const { RefCell::new(None) };
}

/// The override active on this thread, if any
pub(crate) fn thread_override() -> Option<Arc<ServiceProvider>> {
    OVERRIDE_PROVIDER.with(|slot| slot.borrow().clone())
}

/// Thread-local provider override for tests
pub struct TestProvider;

impl TestProvider {
    /// Install `provider` as this thread's ambient provider
    ///
    /// The override is active until the returned guard drops.
    #[must_use]
    pub fn bind(provider: Arc<ServiceProvider>) -> TestProviderGuard {
        OVERRIDE_PROVIDER.with(|slot| {
            *slot.borrow_mut() = Some(provider);
        });
        TestProviderGuard { _private: () }
    }
}

/// Removes the thread-local override on drop
pub struct TestProviderGuard {
    _private: (),
}

impl Drop for TestProviderGuard {
    fn drop(&mut self) {
        OVERRIDE_PROVIDER.with(|slot| {
            *slot.borrow_mut() = None;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::ServiceCollection;
    use crate::Ambient;

    struct Marker;

    #[test]
    fn test_override_cleared_on_drop() {
        let mut services = ServiceCollection::new();
        services.add_instance(Marker);
        let provider = Arc::new(services.build().unwrap());

        {
            let _guard = TestProvider::bind(provider);
            assert!(Ambient::resolve::<Marker>().is_ok());
        }

        assert!(thread_override().is_none());
    }
}

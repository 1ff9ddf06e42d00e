//! Container-wide error types
//!
//! Every failure mode of registration, build, and resolution is a variant of
//! [`ContainerError`]. Build-time variants are fatal to startup: a process
//! must not begin serving traffic if [`ServiceCollection::build`] returns
//! an error.
//!
//! [`ServiceCollection::build`]: crate::ServiceCollection::build

use thiserror::Error;

/// Container-wide error type
///
/// Implements `From`-free constructor helpers so call sites stay terse:
///
/// ```rust,ignore
/// return Err(ContainerError::missing_registration(key.type_name(), Some("UserService")));
/// ```
#[derive(Debug, Clone, Error)]
pub enum ContainerError {
    /// A binding was declared incorrectly at registration time
    ///
    /// Raised by `add_singleton`/`add_transient` for a duplicate dependency
    /// name within one binding, or during activation when a constructor
    /// requests an argument it never declared.
    #[error("Invalid binding for '{type_name}': {message}")]
    Configuration {
        /// The service type whose binding is invalid
        type_name: &'static str,
        /// What was wrong with the declaration
        message: String,
    },

    /// A dependency type has no registration
    ///
    /// Carries the requesting type when the lookup happened while building
    /// or activating another registration, to aid debugging of nested
    /// resolution failures.
    #[error("No registration for type '{type_name}' (required by '{}')", .requested_by.unwrap_or("<root>"))]
    MissingRegistration {
        /// The type that was requested
        type_name: &'static str,
        /// The type whose activation needed it, if known
        requested_by: Option<&'static str>,
    },

    /// A singleton's constructor dependency resolves to a transient
    ///
    /// The core safety invariant: a process-lifetime instance must never
    /// capture a per-resolution instance. Never downgraded to a warning.
    #[error("Cannot inject transient '{dependency}' into singleton '{singleton}'")]
    LifetimeViolation {
        /// The singleton being built
        singleton: &'static str,
        /// The transient it tried to require
        dependency: &'static str,
    },

    /// A full build pass made no progress while registrations remain unbuilt
    ///
    /// Either a cycle among singletons or a transitively blocked dependency.
    #[error("Dependency graph cannot be built, {remaining} registration(s) stuck: {unbuilt:?}")]
    BuildDeadlock {
        /// How many registrations never became buildable
        remaining: usize,
        /// Type names of the stuck registrations
        unbuilt: Vec<&'static str>,
    },

    /// A transient resolution chain revisited a type it is already activating
    ///
    /// Caught by the per-call in-progress guard instead of recursing until
    /// stack exhaustion.
    #[error("Circular transient resolution: {}", chain.join(" -> "))]
    CircularResolution {
        /// The resolution chain, outermost request first
        chain: Vec<&'static str>,
    },

    /// A singleton was resolved before its instance was built
    ///
    /// Only reachable from inside a factory running during the build phase
    /// that resolves a dependency it did not declare with `after`.
    #[error("Singleton '{type_name}' resolved before it was built")]
    NotBuilt {
        /// The singleton that has no instance yet
        type_name: &'static str,
    },

    /// A user constructor or factory reported a failure
    #[error("Failed to activate '{type_name}': {message}")]
    ActivationFailed {
        /// The type being activated
        type_name: &'static str,
        /// The constructor's failure message
        message: String,
    },

    /// A handler adapter ran before `Ambient::bind` was called
    #[error("No ambient service provider is bound")]
    AmbientUnbound,
}

impl ContainerError {
    /// Create a Configuration error for a named type
    pub fn configuration(type_name: &'static str, message: impl Into<String>) -> Self {
        Self::Configuration {
            type_name,
            message: message.into(),
        }
    }

    /// Create a MissingRegistration error from type names
    pub fn missing_registration(
        type_name: &'static str,
        requested_by: Option<&'static str>,
    ) -> Self {
        Self::MissingRegistration {
            type_name,
            requested_by,
        }
    }

    /// Create an ActivationFailed error for a given type
    pub fn activation<T: ?Sized>(message: impl Into<String>) -> Self {
        Self::ActivationFailed {
            type_name: std::any::type_name::<T>(),
            message: message.into(),
        }
    }
}

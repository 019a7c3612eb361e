//! Registry errors.

use thiserror::Error;

use crate::EntityClass;

/// Errors raised by the [`crate::Registry`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    /// No entry was found for the given kind/name pair.
    #[error("{kind:?} {name:?} is not registered")]
    NotFound {
        /// The entity class that was looked up.
        kind: EntityClass,
        /// The name that was looked up.
        name: String,
    },

    /// An entry already exists under this name with a different target.
    /// Re-registering the same name with the identical target is treated
    /// as idempotent and does not raise this error.
    #[error("{kind:?} {name:?} is already registered with a different target")]
    Conflict {
        /// The entity class that was being registered.
        kind: EntityClass,
        /// The name that was being registered.
        name: String,
    },

    /// A registered instance could not be downcast to the requested type.
    #[error("{kind:?} {name:?} is registered but is not of the requested type")]
    TypeMismatch {
        /// The entity class that was looked up.
        kind: EntityClass,
        /// The name that was looked up.
        name: String,
    },

    /// A `RegistrySource` manifest file could not be read or parsed.
    #[error("plugin manifest {path:?} could not be loaded: {message}")]
    ManifestUnreadable {
        /// The manifest path that failed to load.
        path: String,
        /// The underlying I/O or parse error.
        message: String,
    },
}

//! Built-in form types.

pub mod user_registration;

pub use user_registration::user_registration;

use crate::form::registry::FormRegistry;

/// A registry with every built-in form type.
pub fn default_registry() -> FormRegistry {
    let mut registry = FormRegistry::new();
    registry.register(user_registration());
    registry
}

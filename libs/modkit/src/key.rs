//! Opaque keys identifying entries in the [`crate::container::Container`].

use std::fmt;

/// Identifies a container entry either by an explicit name or by the Rust
/// type the caller intends to resolve.
///
/// `Key::of::<T>()` is the common case: one instance (or factory) per type.
/// `Key::named(...)` supports registering several instances of the same
/// type under different logical names (e.g. two database pools).
#[derive(Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Type(&'static str),
    Named(&'static str, std::sync::Arc<str>),
}

impl Key {
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type(std::any::type_name::<T>())
    }

    #[must_use]
    pub fn named<T: ?Sized + 'static>(name: impl Into<std::sync::Arc<str>>) -> Self {
        Self::Named(std::any::type_name::<T>(), name.into())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(t) => write!(f, "{t}"),
            Self::Named(t, name) => write!(f, "{t}#{name}"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_keys_for_the_same_type_are_equal() {
        assert_eq!(Key::of::<String>(), Key::of::<String>());
        assert_ne!(Key::of::<String>(), Key::of::<u32>());
    }

    #[test]
    fn named_keys_distinguish_by_name() {
        assert_ne!(Key::named::<String>("a"), Key::named::<String>("b"));
        assert_eq!(Key::named::<String>("a"), Key::named::<String>("a"));
    }
}

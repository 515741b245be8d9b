//! Request-scoped context values and namespaced keys.
//!
//! [`Context`] is the default context type threaded through a pipeline. It
//! is a persistent list: [`Context::with_value`] returns a *new* context with
//! one more binding and leaves the receiver alone, so a step can hand a
//! richer context to the steps after it without affecting anyone holding the
//! old one.
//!
//! ```rust
//! use pipes::{Context, ContextKey};
//!
//! const USER: ContextKey = ContextKey::new("user");
//!
//! let root = Context::new();
//! let ctx = root.with_value(USER, String::from("alice"));
//!
//! assert_eq!(ctx.value::<String>(&USER).map(String::as_str), Some("alice"));
//! assert!(root.value::<String>(&USER).is_none());
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Namespace used by [`ContextKey::new`].
pub const DEFAULT_NAMESPACE: &str = "Pipes";

// ── ContextKey ────────────────────────────────────────────────────────────────

/// A named slot inside a [`Context`].
///
/// Keys compare by namespace *and* name, so two components that both pick
/// the name `"id"` do not collide as long as they use their own namespace.
/// Keys are `const`-constructible and meant to be declared once:
///
/// ```rust
/// use pipes::ContextKey;
///
/// const REQUEST_ID: ContextKey = ContextKey::namespaced("Tracing", "request-id");
/// assert_eq!(REQUEST_ID.to_string(), "Tracing. Context key: request-id");
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ContextKey {
    namespace: &'static str,
    name: &'static str,
}

impl ContextKey {
    /// A key in the default `"Pipes"` namespace.
    pub const fn new(name: &'static str) -> Self {
        Self::namespaced(DEFAULT_NAMESPACE, name)
    }

    pub const fn namespaced(namespace: &'static str, name: &'static str) -> Self {
        Self { namespace, name }
    }

    pub fn namespace(&self) -> &'static str { self.namespace }
    pub fn name(&self) -> &'static str { self.name }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. Context key: {}", self.namespace, self.name)
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// An immutable, cheaply cloneable set of request-scoped values.
///
/// Cloning is one reference-count increment. Lookups walk from the newest
/// binding to the oldest, so rebinding a key shadows the earlier value.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Binding>>,
}

struct Binding {
    key: ContextKey,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Binding>>,
}

impl Context {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new context with `key` bound to `value`.
    #[must_use]
    pub fn with_value<T>(&self, key: ContextKey, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            head: Some(Arc::new(Binding {
                key,
                value: Arc::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// The newest value bound to `key`, if it has type `T`.
    ///
    /// A binding of another type under the same key yields `None`; it does
    /// not fall through to older bindings.
    pub fn value<T: Any>(&self, key: &ContextKey) -> Option<&T> {
        self.bindings()
            .find(|b| b.key == *key)
            .and_then(|b| b.value.downcast_ref::<T>())
    }

    pub fn contains(&self, key: &ContextKey) -> bool {
        self.bindings().any(|b| b.key == *key)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    fn bindings(&self) -> impl Iterator<Item = &Binding> {
        std::iter::successors(self.head.as_deref(), |b| b.parent.as_deref())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.bindings().map(|b| b.key))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIPELINE: ContextKey = ContextKey::new("pipeline");

    #[test]
    fn key_description_names_namespace_and_key() {
        assert_eq!(PIPELINE.to_string(), "Pipes. Context key: pipeline");
        assert_eq!(PIPELINE.namespace(), "Pipes");
        assert_eq!(PIPELINE.name(), "pipeline");
    }

    #[test]
    fn keys_in_different_namespaces_do_not_collide() {
        let other = ContextKey::namespaced("Auth", "pipeline");
        let ctx = Context::new().with_value(PIPELINE, "1").with_value(other, "2");

        assert_ne!(PIPELINE, other);
        assert_eq!(ctx.value::<&str>(&PIPELINE), Some(&"1"));
        assert_eq!(ctx.value::<&str>(&other), Some(&"2"));
    }

    #[test]
    fn with_value_leaves_receiver_untouched() {
        let root = Context::new();
        let ctx = root.with_value(PIPELINE, 1_u32);

        assert!(root.is_empty());
        assert!(!root.contains(&PIPELINE));
        assert_eq!(ctx.value::<u32>(&PIPELINE), Some(&1));
    }

    #[test]
    fn newest_binding_wins() {
        let ctx = Context::new()
            .with_value(PIPELINE, 1_u32)
            .with_value(PIPELINE, 2_u32);

        assert_eq!(ctx.value::<u32>(&PIPELINE), Some(&2));
    }

    #[test]
    fn wrong_type_yields_none() {
        let ctx = Context::new().with_value(PIPELINE, 1_u32);
        assert!(ctx.value::<String>(&PIPELINE).is_none());
        assert!(ctx.contains(&PIPELINE));
    }
}

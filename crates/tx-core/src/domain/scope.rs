//! # Scope
//!
//! Request-scoped, immutable bindings passed down a call chain.
//!
//! A scope is a persistent list: deriving a scope with a new binding shares
//! every older binding, and the new binding shadows older ones with the same
//! name and type. This is how an inner `requires_new` suspends an outer
//! transaction: the outer handle is still in the list, just not visible.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed key for a scope binding.
///
/// Two keys only address the same binding when both the name and the value
/// type match.
pub struct ScopeKey<T> {
    name: Arc<str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ScopeKey<T> {
    /// Create a key.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            _marker: PhantomData,
        }
    }
}

impl<T> ScopeKey<T> {
    /// Binding name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for ScopeKey<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ScopeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeKey")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

struct Binding {
    name: Arc<str>,
    type_id: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    next: Option<Arc<Binding>>,
}

/// Immutable set of bindings for one logical operation.
#[derive(Clone, Default)]
pub struct Scope {
    head: Option<Arc<Binding>>,
}

impl Scope {
    /// Empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a scope with `value` bound under `key`.
    pub fn with<T: Send + Sync + 'static>(&self, key: &ScopeKey<T>, value: T) -> Scope {
        self.with_shared(key, Arc::new(value))
    }

    /// Derive a scope binding an already shared value.
    pub fn with_shared<T: Send + Sync + 'static>(&self, key: &ScopeKey<T>, value: Arc<T>) -> Scope {
        Scope {
            head: Some(Arc::new(Binding {
                name: Arc::clone(&key.name),
                type_id: TypeId::of::<T>(),
                value,
                next: self.head.clone(),
            })),
        }
    }

    /// Look up the newest binding for `key`.
    pub fn get<T: Send + Sync + 'static>(&self, key: &ScopeKey<T>) -> Option<&T> {
        self.find(key).and_then(|b| b.value.downcast_ref::<T>())
    }

    /// Look up the newest binding for `key` as a shared pointer.
    pub fn get_shared<T: Send + Sync + 'static>(&self, key: &ScopeKey<T>) -> Option<Arc<T>> {
        self.find(key)
            .and_then(|b| Arc::clone(&b.value).downcast::<T>().ok())
    }

    /// Check whether a binding for `key` is visible.
    pub fn contains<T: Send + Sync + 'static>(&self, key: &ScopeKey<T>) -> bool {
        self.find(key).is_some()
    }

    /// Number of bindings, shadowed ones included.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    fn find<T: 'static>(&self, key: &ScopeKey<T>) -> Option<&Binding> {
        let type_id = TypeId::of::<T>();
        self.iter()
            .find(|b| b.type_id == type_id && *b.name == *key.name)
    }

    fn iter(&self) -> impl Iterator<Item = &Binding> {
        std::iter::successors(self.head.as_deref(), |b| b.next.as_deref())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|b| &*b.name))
            .finish()
    }
}

//! A small dependency-injection container: eager instances and lazy,
//! cycle-checked factories, keyed by [`Key`].
//!
//! [`Container`] is a cheap `Arc`-backed handle; cloning it shares the same
//! underlying registry, so a single container can be handed to every module
//! during `Register` without any of them needing a reference back to the
//! application. Entries are looked up behind a [`parking_lot::RwLock`] that
//! is never held across an `.await` point: factory execution happens with
//! the lock released, so one module's slow async constructor cannot block
//! another module's unrelated resolve.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use modkit_errors::ErrorValue;
use parking_lot::{Mutex, RwLock};

use crate::errors::{ERR_CIRCULAR_DEPENDENCY, ERR_DUPLICATE_FACTORY, ERR_DUPLICATE_INSTANCE, ERR_VALUE_NOT_FOUND};
use crate::key::Key;

type AnyArc = Arc<dyn Any + Send + Sync>;
type FactoryFn = Arc<dyn Fn(Resolver) -> BoxFuture<'static, Result<AnyArc, ErrorValue>> + Send + Sync>;

#[derive(Default)]
struct Entry {
    instance: Option<AnyArc>,
    factory: Option<FactoryFn>,
}

struct Inner {
    entries: RwLock<HashMap<Key, Entry>>,
}

/// A cloneable handle to a shared dependency registry.
#[derive(Clone)]
pub struct Container(Arc<Inner>);

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(Inner { entries: RwLock::new(HashMap::new()) }))
    }

    /// Register an eagerly-constructed instance under `T`'s type key.
    ///
    /// # Errors
    ///
    /// Returns [`ERR_DUPLICATE_INSTANCE`] if an instance is already
    /// registered for this key. A factory already registered for the same
    /// key is unaffected and still wins only if no instance is present.
    pub fn instance<T: Send + Sync + 'static>(&self, value: T) -> Result<(), ErrorValue> {
        self.instance_at(Key::of::<T>(), value)
    }

    /// Register an eagerly-constructed instance under an explicit name,
    /// for when several values of the same type coexist.
    ///
    /// # Errors
    ///
    /// Returns [`ERR_DUPLICATE_INSTANCE`] if an instance is already
    /// registered under this name.
    pub fn instance_named<T: Send + Sync + 'static>(
        &self,
        name: impl Into<Arc<str>>,
        value: T,
    ) -> Result<(), ErrorValue> {
        self.instance_at(Key::named::<T>(name), value)
    }

    fn instance_at<T: Send + Sync + 'static>(&self, key: Key, value: T) -> Result<(), ErrorValue> {
        let mut guard = self.0.entries.write();
        let entry = guard.entry(key.clone()).or_default();
        if entry.instance.is_some() {
            return Err(ERR_DUPLICATE_INSTANCE.value().with_detail("key", key.to_string()));
        }
        entry.instance = Some(Arc::new(value));
        Ok(())
    }

    /// Register a lazy factory under `T`'s type key. The factory runs at
    /// most once: the first successful [`Container::resolve`] caches its
    /// result for every subsequent call.
    ///
    /// # Errors
    ///
    /// Returns [`ERR_DUPLICATE_FACTORY`] if a factory is already registered
    /// for this key.
    pub fn factory<T, F, Fut>(&self, build: F) -> Result<(), ErrorValue>
    where
        T: Send + Sync + 'static,
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ErrorValue>> + Send + 'static,
    {
        self.factory_at(Key::of::<T>(), build)
    }

    /// Named-key counterpart to [`Container::factory`].
    ///
    /// # Errors
    ///
    /// Returns [`ERR_DUPLICATE_FACTORY`] if a factory is already registered
    /// under this name.
    pub fn factory_named<T, F, Fut>(&self, name: impl Into<Arc<str>>, build: F) -> Result<(), ErrorValue>
    where
        T: Send + Sync + 'static,
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ErrorValue>> + Send + 'static,
    {
        self.factory_at(Key::named::<T>(name), build)
    }

    fn factory_at<T, F, Fut>(&self, key: Key, build: F) -> Result<(), ErrorValue>
    where
        T: Send + Sync + 'static,
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ErrorValue>> + Send + 'static,
    {
        let wrapped: FactoryFn = Arc::new(move |resolver| {
            let fut = build(resolver);
            Box::pin(async move { fut.await.map(|v| Arc::new(v) as AnyArc) })
        });

        let mut guard = self.0.entries.write();
        let entry = guard.entry(key.clone()).or_default();
        if entry.factory.is_some() {
            return Err(ERR_DUPLICATE_FACTORY.value().with_detail("key", key.to_string()));
        }
        entry.factory = Some(wrapped);
        Ok(())
    }

    /// Resolve `T`'s type-keyed entry, running its factory (and any nested
    /// factories it depends on) if no instance is cached yet.
    ///
    /// # Errors
    ///
    /// Returns [`ERR_VALUE_NOT_FOUND`] if no instance or factory is
    /// registered, or [`ERR_CIRCULAR_DEPENDENCY`] if resolving `T`
    /// transitively depends on resolving `T` again.
    pub async fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ErrorValue> {
        self.resolve_key(Key::of::<T>()).await
    }

    /// Named-key counterpart to [`Container::resolve`].
    ///
    /// # Errors
    ///
    /// See [`Container::resolve`].
    pub async fn resolve_named<T: Send + Sync + 'static>(&self, name: impl Into<Arc<str>>) -> Result<Arc<T>, ErrorValue> {
        self.resolve_key(Key::named::<T>(name)).await
    }

    async fn resolve_key<T: Send + Sync + 'static>(&self, key: Key) -> Result<Arc<T>, ErrorValue> {
        let chain = Arc::new(Mutex::new(HashSet::new()));
        let any = self.resolve_dyn(key.clone(), chain).await?;
        any.downcast::<T>().map_err(|_| ERR_VALUE_NOT_FOUND.value().with_detail("key", key.to_string()))
    }

    /// True if an instance or factory is registered for `T`'s type key.
    #[must_use]
    pub fn has<T: Send + Sync + 'static>(&self) -> bool {
        self.has_key(&Key::of::<T>())
    }

    fn has_key(&self, key: &Key) -> bool {
        self.0.entries.read().contains_key(key)
    }

    async fn resolve_dyn(&self, key: Key, chain: Arc<Mutex<HashSet<Key>>>) -> Result<AnyArc, ErrorValue> {
        if let Some(instance) = self.cached_instance(&key) {
            return Ok(instance);
        }

        {
            let mut chain_guard = chain.lock();
            if !chain_guard.insert(key.clone()) {
                return Err(ERR_CIRCULAR_DEPENDENCY.value().with_detail("key", key.to_string()));
            }
        }

        let factory = self.0.entries.read().get(&key).and_then(|e| e.factory.clone());
        let Some(factory) = factory else {
            chain.lock().remove(&key);
            return Err(ERR_VALUE_NOT_FOUND.value().with_detail("key", key.to_string()));
        };

        let resolver = Resolver { container: self.clone(), chain: Arc::clone(&chain) };
        let built = factory(resolver).await;
        chain.lock().remove(&key);
        let built = built?;

        let mut guard = self.0.entries.write();
        let entry = guard.entry(key.clone()).or_default();
        if let Some(existing) = &entry.instance {
            return Ok(Arc::clone(existing));
        }
        entry.instance = Some(Arc::clone(&built));
        Ok(built)
    }

    fn cached_instance(&self, key: &Key) -> Option<AnyArc> {
        self.0.entries.read().get(key).and_then(|e| e.instance.clone())
    }
}

/// Handed to a factory so it can resolve its own dependencies through the
/// same cycle-detection chain as the call that triggered it.
#[derive(Clone)]
pub struct Resolver {
    container: Container,
    chain: Arc<Mutex<HashSet<Key>>>,
}

impl Resolver {
    /// # Errors
    ///
    /// See [`Container::resolve`].
    pub async fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ErrorValue> {
        let key = Key::of::<T>();
        let any = self.container.resolve_dyn(key.clone(), Arc::clone(&self.chain)).await?;
        any.downcast::<T>().map_err(|_| ERR_VALUE_NOT_FOUND.value().with_detail("key", key.to_string()))
    }

    /// # Errors
    ///
    /// See [`Container::resolve`].
    pub async fn resolve_named<T: Send + Sync + 'static>(&self, name: impl Into<Arc<str>>) -> Result<Arc<T>, ErrorValue> {
        let key = Key::named::<T>(name);
        let any = self.container.resolve_dyn(key.clone(), Arc::clone(&self.chain)).await?;
        any.downcast::<T>().map_err(|_| ERR_VALUE_NOT_FOUND.value().with_detail("key", key.to_string()))
    }
}

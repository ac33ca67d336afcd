//! Reducer instantiation
//!
//! Named reducers are looked up by type. Instances can be registered
//! directly, built lazily by a factory that may resolve its own
//! collaborators, or built from `Default`.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Resolver) -> Instance + Send + Sync>;

/// Type-keyed registry of reducer instances and factories
#[derive(Clone, Default)]
pub struct Resolver {
    factories: Arc<RwLock<HashMap<TypeId, Factory>>>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a ready instance; every resolve returns the same `Arc`
    pub fn register<R: Send + Sync + 'static>(&self, instance: R) -> &Self {
        let instance: Instance = Arc::new(instance);
        self.insert::<R>(Arc::new(move |_: &Resolver| Arc::clone(&instance)))
    }

    /// Register a factory invoked on every resolve
    pub fn register_factory<R, F>(&self, factory: F) -> &Self
    where
        R: Send + Sync + 'static,
        F: Fn(&Resolver) -> R + Send + Sync + 'static,
    {
        self.insert::<R>(Arc::new(move |resolver: &Resolver| {
            Arc::new(factory(resolver)) as Instance
        }))
    }

    /// Register a type built through `Default` on every resolve
    pub fn register_default<R: Default + Send + Sync + 'static>(&self) -> &Self {
        self.register_factory(|_| R::default())
    }

    pub fn resolve<R: Send + Sync + 'static>(&self) -> Option<Arc<R>> {
        // Clone the factory out so it can resolve through `self` unlocked
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<R>())
            .cloned()?;

        factory(self).downcast::<R>().ok()
    }

    pub fn contains<R: 'static>(&self) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<R>())
    }

    fn insert<R: 'static>(&self, factory: Factory) -> &Self {
        tracing::debug!("Registering reducer {}", type_name::<R>());
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<R>(), factory);
        self
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("Resolver").field("registered", &count).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Clock {
        offset: u64,
    }

    struct Stamper {
        clock: Arc<Clock>,
    }

    #[test]
    fn test_register_returns_same_instance() {
        let resolver = Resolver::new();
        resolver.register(Clock { offset: 3 });

        let a = resolver.resolve::<Clock>().unwrap();
        let b = resolver.resolve::<Clock>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.offset, 3);
    }

    #[test]
    fn test_factory_resolves_collaborators() {
        let resolver = Resolver::new();
        resolver.register(Clock { offset: 9 });
        resolver.register_factory(|r: &Resolver| Stamper {
            clock: r.resolve::<Clock>().unwrap_or_default(),
        });

        let stamper = resolver.resolve::<Stamper>().unwrap();
        assert_eq!(stamper.clock.offset, 9);
    }

    #[test]
    fn test_missing_registration() {
        let resolver = Resolver::new();
        assert!(resolver.resolve::<Clock>().is_none());
        assert!(!resolver.contains::<Clock>());

        resolver.register_default::<Clock>();
        assert!(resolver.contains::<Clock>());
        assert_eq!(resolver.resolve::<Clock>().unwrap().offset, 0);
    }
}

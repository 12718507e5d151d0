// src/resolver.rs
//
// The Resolver port. The source used host-platform reflection to turn a
// job-type symbol into a constructed job instance; this crate re-architects
// that as an explicit type registry, generalizing the pattern the teacher's
// `DriverFactory::get` used for its fixed `Engine` enum (drivers.rs) into an
// open, string-keyed mapping populated by explicit registration at startup.

use crate::job::Job;
use std::collections::HashMap;
use std::sync::Arc;

/// Pure lookup from a symbolic job-type name to a constructed `Job`. Must be
/// safe to call from any execution activity — implementations are `Sync`.
pub trait Resolver: Send + Sync + 'static {
    fn resolve(&self, type_symbol: &str) -> Option<Job>;
}

type Constructor = Arc<dyn Fn() -> Job + Send + Sync>;

/// An explicit mapping from job-type name to a constructor function,
/// registered once at startup. There is no runtime type scanning.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    constructors: HashMap<String, Constructor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor for `type_symbol`. Re-registering the same
    /// symbol replaces the previous constructor.
    pub fn register<F>(&mut self, type_symbol: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Job + Send + Sync + 'static,
    {
        self.constructors
            .insert(type_symbol.into(), Arc::new(constructor));
        self
    }

    pub fn is_registered(&self, type_symbol: &str) -> bool {
        self.constructors.contains_key(type_symbol)
    }
}

impl Resolver for TypeRegistry {
    fn resolve(&self, type_symbol: &str) -> Option<Job> {
        self.constructors.get(type_symbol).map(|ctor| ctor())
    }
}

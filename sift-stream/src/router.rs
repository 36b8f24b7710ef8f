//! Key-based fan-out of recovered payloads

use std::hash::Hash;

use ahash::{AHashMap, AHashSet};
use sift_core::{Result, SiftError};

/// Delivery callback invoked once per (acceptor, payload) pair.
pub type RouteHandler<A, D> = Box<dyn Fn(&A, &D) + Send + Sync>;

/// Derives a routing key from a payload, enabling mapped routing.
pub type KeyMapper<K, D> = Box<dyn Fn(&D) -> K + Send + Sync>;

/// Fan-out registry from routing keys to acceptor handles.
///
/// Consumers register an acceptor handle under the keys they care about;
/// `route` then delivers a payload to every acceptor registered under its
/// key through the delivery handler. A router built with a key mapper can
/// also derive the key from the payload itself.
pub struct Router<K, A, D> {
    routes: AHashMap<K, AHashSet<A>>,
    handler: RouteHandler<A, D>,
    mapper: Option<KeyMapper<K, D>>,
}

impl<K, A, D> Router<K, A, D>
where
    K: Eq + Hash + Clone,
    A: Eq + Hash,
{
    /// Create a router delivering through `handler`.
    pub fn new(handler: RouteHandler<A, D>) -> Self {
        Router {
            routes: AHashMap::new(),
            handler,
            mapper: None,
        }
    }

    /// Create a router that derives routing keys with `mapper`.
    pub fn with_key_mapper(mapper: KeyMapper<K, D>, handler: RouteHandler<A, D>) -> Self {
        Router {
            mapper: Some(mapper),
            ..Self::new(handler)
        }
    }

    /// Register `acceptor` under `key`. Returns false when that exact
    /// registration already exists.
    pub fn register(&mut self, key: K, acceptor: A) -> bool {
        self.routes.entry(key).or_default().insert(acceptor)
    }

    /// Remove one registration. Returns false when it was not present.
    pub fn unregister(&mut self, key: &K, acceptor: &A) -> bool {
        self.routes
            .get_mut(key)
            .map(|acceptors| acceptors.remove(acceptor))
            .unwrap_or(false)
    }

    /// Remove a key and all of its acceptors.
    pub fn unregister_key(&mut self, key: &K) -> Option<AHashSet<A>> {
        self.routes.remove(key)
    }

    /// Every key with a registration entry, in no particular order.
    pub fn registered_keys(&self) -> Vec<K> {
        self.routes.keys().cloned().collect()
    }

    /// Deliver `payload` to every acceptor registered under `key`.
    ///
    /// Returns false, delivering nothing, when the key is absent or has an
    /// empty acceptor set.
    pub fn route(&self, key: &K, payload: &D) -> bool {
        match self.routes.get(key) {
            Some(acceptors) if !acceptors.is_empty() => {
                for acceptor in acceptors {
                    (self.handler)(acceptor, payload);
                }
                true
            }
            _ => false,
        }
    }

    /// Derive the key from `payload` and route to it.
    ///
    /// Fails with `SiftError::RouterNoMapper` when the router was built
    /// without a key mapper.
    pub fn route_mapped(&self, payload: &D) -> Result<bool> {
        let mapper = self.mapper.as_ref().ok_or(SiftError::RouterNoMapper)?;
        let key = mapper(payload);
        Ok(self.route(&key, payload))
    }
}

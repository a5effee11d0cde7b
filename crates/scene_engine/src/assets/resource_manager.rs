//! Resource Manager - deduplicating cache for GPU-backed resources
//!
//! Shaders, programs, textures and primitives are all expensive to create and
//! are shared by many materials and models. Each kind is cached by a
//! [`ResourceManager`] that maps an immutable, ordered key to exactly one
//! live resource.
//!
//! **SEPARATION OF CONCERNS**:
//! - [`ResourceFactory`]: knows how to create and destroy one kind of resource
//! - [`ResourceManager`]: owns the cache, dedups by key, drives the lifecycle
//!
//! **Ownership**: managers are plain values constructed by the application and
//! passed (usually behind an `Arc`) to whatever needs them. There is no global
//! registry, so tests build an isolated cache each.
//!
//! **Concurrency**: the map is guarded by one mutex. The lock is held across
//! [`ResourceFactory::create`], so two threads inserting the same unseen key
//! never both create it; creation of different keys is serialized as a result.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Creates and destroys one kind of cached resource
pub trait ResourceFactory {
    /// Descriptor identifying a resource; at most one resource exists per key
    type Key: Ord + Clone + Debug;

    /// Creation input that is not part of the identity (sources, pixels, ...)
    type Data: ?Sized;

    /// The cached resource
    type Resource;

    /// Creation failure
    type Error;

    /// Build a resource for a key that is not cached yet
    ///
    /// # Arguments
    /// * `key` - Identity of the resource being created
    /// * `data` - Creation input supplied by the caller of `insert`
    ///
    /// # Returns
    /// The new resource, or an error that `insert` hands back unchanged
    fn create(&self, key: &Self::Key, data: &Self::Data) -> Result<Self::Resource, Self::Error>;

    /// Release whatever the resource holds outside of Rust memory
    ///
    /// Called exactly once per resource, when it leaves the cache.
    fn destroy(&self, _key: &Self::Key, _resource: &Self::Resource) {}
}

/// Deduplicating, owning resource cache
///
/// Resources are handed out as `Arc`s. Erasing an entry runs the factory's
/// destroy hook immediately, even if callers still hold clones of the `Arc`;
/// the manager is the owner of the underlying device object.
pub struct ResourceManager<F: ResourceFactory> {
    factory: F,
    resources: Mutex<BTreeMap<F::Key, Arc<F::Resource>>>,
}

impl<F: ResourceFactory> ResourceManager<F> {
    /// Create an empty manager around a factory
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            resources: Mutex::new(BTreeMap::new()),
        }
    }

    /// Access the factory
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Return the cached resource for `key`, creating it on a miss
    ///
    /// `data` is only consulted when the key is not cached yet; a second
    /// insert with the same key and different data returns the first
    /// resource. A failed creation leaves the key uncached, so a later insert
    /// tries again.
    ///
    /// # Arguments
    /// * `key` - Identity of the resource
    /// * `data` - Creation input used on a miss
    ///
    /// # Returns
    /// * `Ok(Arc<Resource>)` - Cached or freshly created resource
    /// * `Err(F::Error)` - Creation failed; nothing was cached
    pub fn insert(&self, key: &F::Key, data: &F::Data) -> Result<Arc<F::Resource>, F::Error> {
        let mut resources = self.lock();
        if let Some(existing) = resources.get(key) {
            log::trace!("Resource cache hit for {:?}", key);
            return Ok(Arc::clone(existing));
        }

        let resource = Arc::new(self.factory.create(key, data)?);
        resources.insert(key.clone(), Arc::clone(&resource));
        drop(resources);

        log::debug!("Created resource {:?}", key);
        Ok(resource)
    }

    /// Look up a resource without creating it
    pub fn find(&self, key: &F::Key) -> Option<Arc<F::Resource>> {
        self.lock().get(key).cloned()
    }

    /// Whether a resource is cached for `key`
    pub fn contains(&self, key: &F::Key) -> bool {
        self.lock().contains_key(key)
    }

    /// Destroy and remove one entry
    ///
    /// # Returns
    /// `true` if the key was cached
    pub fn erase(&self, key: &F::Key) -> bool {
        let removed = self.lock().remove_entry(key);
        match removed {
            Some((key, resource)) => {
                self.factory.destroy(&key, &resource);
                log::debug!("Erased resource {:?}", key);
                true
            }
            None => false,
        }
    }

    /// Destroy and remove every entry
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.lock());
        if !drained.is_empty() {
            log::debug!("Clearing {} cached resources", drained.len());
        }
        for (key, resource) in &drained {
            self.factory.destroy(key, resource);
        }
    }

    /// Number of cached resources
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of the cached keys, in key order
    pub fn keys(&self) -> Vec<F::Key> {
        self.lock().keys().cloned().collect()
    }

    /// Snapshot of the cached resources, in key order
    pub fn values(&self) -> Vec<Arc<F::Resource>> {
        self.lock().values().cloned().collect()
    }

    // Entries are only ever inserted fully built, so the map is consistent
    // even if a panicking thread poisoned the lock.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<F::Key, Arc<F::Resource>>> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F: ResourceFactory> Drop for ResourceManager<F> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<F: ResourceFactory> Debug for ResourceManager<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("keys", &self.keys())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

//! Descriptor cache
//!
//! Keyed by descriptor key. Entries hold a non-owning `TemplateRef`; a
//! lookup re-checks it against the registry and evicts the entry when the
//! backing type has been unloaded or re-registered. Correctness never
//! depends on the cache being warm.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::descriptor::OperationDescriptor;
use crate::primitives::TemplateRef;
use crate::reflection::TypeRegistry;

#[derive(Debug, Clone)]
struct CacheEntry {
    descriptor: OperationDescriptor,
    template: Option<TemplateRef>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub stale_evictions: u64,
    pub inserts: u64,
}

#[derive(Debug, Default)]
pub struct DescriptorCache {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache one descriptor under its key; the template handle comes from
    /// the descriptor itself.
    pub fn insert(&mut self, descriptor: &OperationDescriptor) {
        let mut descriptor = descriptor.clone();
        descriptor.relevance_score = 0;
        let entry = CacheEntry {
            template: descriptor.template.clone(),
            descriptor,
        };
        self.entries.insert(entry.descriptor.key.clone(), entry);
        self.stats.inserts += 1;
    }

    pub fn insert_all<'a>(&mut self, descriptors: impl IntoIterator<Item = &'a OperationDescriptor>) {
        for descriptor in descriptors {
            self.insert(descriptor);
        }
    }

    /// The cached descriptor, only if its template is still live.
    pub fn lookup(&mut self, key: &str, registry: &TypeRegistry) -> Option<OperationDescriptor> {
        let Some(entry) = self.entries.get(key) else {
            self.stats.misses += 1;
            return None;
        };

        let live = entry
            .template
            .as_ref()
            .map_or(true, |template| registry.is_live(template));

        if live {
            self.stats.hits += 1;
            Some(entry.descriptor.clone())
        } else {
            debug!(key, "evicting stale descriptor");
            self.entries.remove(key);
            self.stats.stale_evictions += 1;
            self.stats.misses += 1;
            None
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop every entry whose template is no longer live.
    pub fn purge_stale(&mut self, registry: &TypeRegistry) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            entry
                .template
                .as_ref()
                .map_or(true, |template| registry.is_live(template))
        });
        let evicted = before - self.entries.len();
        self.stats.stale_evictions += evicted as u64;
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            ..self.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{describe_cast, describe_function, describe_reroute};
    use crate::reflection::{paths, ReflectedType};

    #[test]
    fn test_lookup_hit_and_miss() {
        let registry = TypeRegistry::with_builtins();
        let lib = registry.get(paths::MATH_LIBRARY).unwrap();
        let desc = describe_function(lib, lib.info.function("Lerp").unwrap());

        let mut cache = DescriptorCache::new();
        assert!(cache.lookup(&desc.key, &registry).is_none());
        cache.insert(&desc);
        assert_eq!(cache.lookup(&desc.key, &registry).unwrap().key, desc.key);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_stale_entry_returns_nothing_and_is_evicted() {
        let mut registry = TypeRegistry::with_builtins();
        registry.register(ReflectedType::class("/Game/BP_Door.BP_Door_C", "BP_Door"));
        let desc = describe_cast(registry.get("/Game/BP_Door.BP_Door_C").unwrap());

        let mut cache = DescriptorCache::new();
        cache.insert(&desc);

        registry.unload("/Game/BP_Door.BP_Door_C");
        assert!(cache.lookup(&desc.key, &registry).is_none());
        assert!(!cache.contains(&desc.key));
        assert_eq!(cache.stats().stale_evictions, 1);
    }

    #[test]
    fn test_reregistration_makes_entry_stale() {
        let mut registry = TypeRegistry::with_builtins();
        registry.register(ReflectedType::class("/Game/BP_Door.BP_Door_C", "BP_Door"));
        let desc = describe_cast(registry.get("/Game/BP_Door.BP_Door_C").unwrap());

        let mut cache = DescriptorCache::new();
        cache.insert(&desc);
        registry.register(ReflectedType::class("/Game/BP_Door.BP_Door_C", "BP_Door"));
        assert!(cache.lookup(&desc.key, &registry).is_none());
    }

    #[test]
    fn test_reroute_never_goes_stale() {
        let registry = TypeRegistry::new();
        let mut cache = DescriptorCache::new();
        cache.insert(&describe_reroute());
        assert!(cache.lookup("reroute", &registry).is_some());
    }

    #[test]
    fn test_purge_stale() {
        let mut registry = TypeRegistry::with_builtins();
        registry.register(ReflectedType::class("/Game/A.A_C", "A"));
        let mut cache = DescriptorCache::new();
        cache.insert(&describe_cast(registry.get("/Game/A.A_C").unwrap()));
        cache.insert(&describe_reroute());

        registry.unload("/Game/A.A_C");
        assert_eq!(cache.purge_stale(&registry), 1);
        assert_eq!(cache.len(), 1);
    }
}

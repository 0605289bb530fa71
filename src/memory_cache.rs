use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::PermissionCache;
use crate::codename::Codename;
use crate::types::{PrincipalId, RoleId, TenantId};

/// In-memory cache for computed permission sets.
///
/// This is a simple LRU cache with optional TTL. It is intended for tests
/// and small deployments where a process-local cache is sufficient.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<Mutex<CacheState>>,
    capacity: usize,
    ttl: Option<Duration>,
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    order: VecDeque<CacheKey>,
}

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct CacheKey {
    tenant: TenantId,
    principal: PrincipalId,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    perms: HashSet<Codename>,
    updated_at: Instant,
}

impl MemoryCache {
    /// Creates a new cache with the given capacity.
    ///
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            })),
            capacity,
            ttl: None,
        }
    }

    /// Configures a time-to-live for cache entries.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    fn key(tenant: &TenantId, principal: &PrincipalId) -> CacheKey {
        CacheKey {
            tenant: tenant.clone(),
            principal: principal.clone(),
        }
    }

    fn remove_key(state: &mut CacheState, key: &CacheKey) {
        if state.entries.remove(key).is_some() {
            state.order.retain(|existing| existing != key);
        }
    }

    fn touch(state: &mut CacheState, key: &CacheKey) {
        state.order.retain(|existing| existing != key);
        state.order.push_back(key.clone());
    }

    fn is_expired(entry: &CacheEntry, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(entry.updated_at) > ttl
    }

    fn prune_expired(state: &mut CacheState, ttl: Duration, now: Instant) {
        state
            .entries
            .retain(|_, entry| !Self::is_expired(entry, ttl, now));
        state.order.retain(|key| state.entries.contains_key(key));
    }

    fn evict_if_needed(state: &mut CacheState, capacity: usize) {
        if capacity == 0 {
            state.entries.clear();
            state.order.clear();
            return;
        }

        while state.entries.len() > capacity {
            if let Some(key) = state.order.pop_front() {
                state.entries.remove(&key);
            } else {
                break;
            }
        }
    }

    fn invalidate_tenant_inner(state: &mut CacheState, tenant: &TenantId) {
        let keys: Vec<CacheKey> = state
            .entries
            .keys()
            .filter(|key| &key.tenant == tenant)
            .cloned()
            .collect();
        for key in keys {
            Self::remove_key(state, &key);
        }
    }
}

#[async_trait]
impl PermissionCache for MemoryCache {
    async fn get(&self, tenant: &TenantId, principal: &PrincipalId) -> Option<HashSet<Codename>> {
        if self.capacity == 0 {
            return None;
        }

        let key = Self::key(tenant, principal);
        let now = Instant::now();
        let mut guard = self.inner.lock().expect("poisoned lock");

        if let Some(ttl) = self.ttl {
            if let Some(entry) = guard.entries.get(&key) {
                if Self::is_expired(entry, ttl, now) {
                    Self::remove_key(&mut guard, &key);
                    return None;
                }
            }
        }

        let perms = guard.entries.get(&key).map(|entry| entry.perms.clone());
        if perms.is_some() {
            Self::touch(&mut guard, &key);
        }
        perms
    }

    async fn put(&self, tenant: &TenantId, principal: &PrincipalId, perms: HashSet<Codename>) {
        if self.capacity == 0 {
            return;
        }

        let key = Self::key(tenant, principal);
        let now = Instant::now();
        let mut guard = self.inner.lock().expect("poisoned lock");

        if let Some(ttl) = self.ttl {
            Self::prune_expired(&mut guard, ttl, now);
        }

        guard.entries.insert(
            key.clone(),
            CacheEntry {
                perms,
                updated_at: now,
            },
        );
        Self::touch(&mut guard, &key);
        Self::evict_if_needed(&mut guard, self.capacity);
    }

    async fn invalidate_principal(&self, tenant: &TenantId, principal: &PrincipalId) {
        let key = Self::key(tenant, principal);
        let mut guard = self.inner.lock().expect("poisoned lock");
        Self::remove_key(&mut guard, &key);
    }

    async fn invalidate_role(&self, tenant: &TenantId, _role: &RoleId) {
        // Role-to-principal relationships are unknown here, so we invalidate the tenant scope.
        let mut guard = self.inner.lock().expect("poisoned lock");
        Self::invalidate_tenant_inner(&mut guard, tenant);
    }

    async fn invalidate_tenant(&self, tenant: &TenantId) {
        let mut guard = self.inner.lock().expect("poisoned lock");
        Self::invalidate_tenant_inner(&mut guard, tenant);
    }
}

use crate::codename::Codename;
use crate::types::{PrincipalId, RoleId, TenantId};
use async_trait::async_trait;
use std::collections::HashSet;

/// Cache interface for computed permission sets.
///
/// Keyed by (tenant, principal). Implementations must use
/// invalidation-on-write rather than relying on staleness tolerance: the
/// embedding application fires the `invalidate_*` hooks on every
/// membership, role, or permission mutation, because authorization
/// correctness must never lag behind a revocation.
#[async_trait]
pub trait PermissionCache: Send + Sync {
    /// Gets the cached permission set for a (tenant, principal) pair.
    async fn get(&self, tenant: &TenantId, principal: &PrincipalId) -> Option<HashSet<Codename>>;

    /// Caches the permission set for a (tenant, principal) pair.
    async fn put(&self, tenant: &TenantId, principal: &PrincipalId, perms: HashSet<Codename>);

    /// Invalidates the entry for a principal within a tenant.
    async fn invalidate_principal(&self, tenant: &TenantId, principal: &PrincipalId);

    /// Invalidates entries affected by a role mutation.
    async fn invalidate_role(&self, tenant: &TenantId, role: &RoleId);

    /// Invalidates every entry for a tenant.
    async fn invalidate_tenant(&self, tenant: &TenantId);
}

/// No-op cache implementation.
///
/// The default: permission sets are computed per facade and never shared
/// across requests, which avoids any correctness risk from staleness.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl PermissionCache for NoCache {
    async fn get(&self, _tenant: &TenantId, _principal: &PrincipalId) -> Option<HashSet<Codename>> {
        None
    }

    async fn put(&self, _tenant: &TenantId, _principal: &PrincipalId, _perms: HashSet<Codename>) {}

    async fn invalidate_principal(&self, _tenant: &TenantId, _principal: &PrincipalId) {}

    async fn invalidate_role(&self, _tenant: &TenantId, _role: &RoleId) {}

    async fn invalidate_tenant(&self, _tenant: &TenantId) {}
}

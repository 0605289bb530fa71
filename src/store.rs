use crate::error::StoreError;
use crate::model::{Membership, PermissionRecord, Role, Tenant};
use crate::types::{MembershipId, PrincipalId, RoleId, TenantId};
use async_trait::async_trait;

/// Store interface for tenant lookup during resolution.
#[async_trait]
pub trait TenantDirectory {
    /// Finds a tenant by its unique slug.
    async fn find_tenant_by_slug(
        &self,
        slug: &str,
    ) -> std::result::Result<Option<Tenant>, StoreError>;

    /// Finds a tenant by its unique custom domain.
    async fn find_tenant_by_domain(
        &self,
        domain: &str,
    ) -> std::result::Result<Option<Tenant>, StoreError>;
}

/// Store interface for the membership/role/permission graph.
#[async_trait]
pub trait MembershipStore {
    /// Finds the active membership for a (principal, tenant) pair.
    ///
    /// Inactive memberships are not returned; at most one membership exists
    /// per pair.
    async fn find_active_membership(
        &self,
        principal: &PrincipalId,
        tenant: &TenantId,
    ) -> std::result::Result<Option<Membership>, StoreError>;

    /// Returns the active roles attached to a membership.
    async fn list_active_roles(
        &self,
        membership: &MembershipId,
    ) -> std::result::Result<Vec<Role>, StoreError>;

    /// Returns the permissions bound to a role.
    async fn list_permissions(
        &self,
        role: &RoleId,
    ) -> std::result::Result<Vec<PermissionRecord>, StoreError>;
}

/// Composite store trait.
pub trait EntityStore: TenantDirectory + MembershipStore + Send + Sync {}

impl<T> EntityStore for T where T: TenantDirectory + MembershipStore + Send + Sync {}

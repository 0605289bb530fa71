use crate::error::{Error, Result, StoreError};
use crate::model::{Membership, PermissionRecord, Role, Tenant};
use crate::store::{MembershipStore, TenantDirectory};
use crate::types::{MembershipId, PermissionId, PrincipalId, RoleId, TenantId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory entity store for tests and demos.
///
/// Arena-style maps keyed by id. Slugs and domains are expected to be
/// unique across tenants, at most one membership exists per
/// (principal, tenant) pair, and role or permission attachments never
/// cross tenant boundaries, mirroring what a relational adapter would
/// enforce.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
    memberships: RwLock<HashMap<MembershipId, Membership>>,
    membership_index: RwLock<HashMap<(PrincipalId, TenantId), MembershipId>>,
    roles: RwLock<HashMap<RoleId, Role>>,
    permissions: RwLock<HashMap<PermissionId, PermissionRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a tenant.
    pub fn insert_tenant(&self, tenant: Tenant) {
        let mut guard = self.inner.tenants.write().expect("poisoned lock");
        guard.insert(tenant.id.clone(), tenant);
    }

    /// Sets a tenant's active flag.
    pub fn set_tenant_active(&self, tenant: &TenantId, active: bool) {
        let mut guard = self.inner.tenants.write().expect("poisoned lock");
        if let Some(record) = guard.get_mut(tenant) {
            record.active = active;
        }
    }

    /// Inserts a membership, replacing any prior one for the same
    /// (principal, tenant) pair.
    pub fn insert_membership(&self, membership: Membership) {
        let mut index = self.inner.membership_index.write().expect("poisoned lock");
        let mut memberships = self.inner.memberships.write().expect("poisoned lock");
        let key = (membership.principal.clone(), membership.tenant.clone());
        if let Some(previous) = index.insert(key, membership.id.clone()) {
            memberships.remove(&previous);
        }
        memberships.insert(membership.id.clone(), membership);
    }

    /// Sets a membership's active flag.
    pub fn set_membership_active(&self, membership: &MembershipId, active: bool) {
        let mut guard = self.inner.memberships.write().expect("poisoned lock");
        if let Some(record) = guard.get_mut(membership) {
            record.active = active;
        }
    }

    /// Inserts or replaces a role.
    pub fn insert_role(&self, role: Role) {
        let mut guard = self.inner.roles.write().expect("poisoned lock");
        guard.insert(role.id.clone(), role);
    }

    /// Sets a role's active flag.
    pub fn set_role_active(&self, role: &RoleId, active: bool) {
        let mut guard = self.inner.roles.write().expect("poisoned lock");
        if let Some(record) = guard.get_mut(role) {
            record.active = active;
        }
    }

    /// Inserts or replaces a permission record.
    pub fn insert_permission(&self, permission: PermissionRecord) {
        let mut guard = self.inner.permissions.write().expect("poisoned lock");
        guard.insert(permission.id.clone(), permission);
    }

    /// Attaches a role to a membership.
    ///
    /// Fails if the role is scoped to a different tenant than the
    /// membership.
    pub fn add_role_to_membership(&self, membership: &MembershipId, role: &RoleId) -> Result<()> {
        let roles = self.inner.roles.read().expect("poisoned lock");
        let role_record = roles
            .get(role)
            .ok_or_else(|| Error::InvalidId(format!("unknown role '{role}'")))?;
        let mut memberships = self.inner.memberships.write().expect("poisoned lock");
        let membership_record = memberships
            .get_mut(membership)
            .ok_or_else(|| Error::InvalidId(format!("unknown membership '{membership}'")))?;
        if role_record.tenant != membership_record.tenant {
            return Err(Error::TenantMismatch(format!(
                "role '{}' is scoped to tenant '{}', not '{}'",
                role_record.id, role_record.tenant, membership_record.tenant
            )));
        }
        membership_record.role_ids.insert(role.clone());
        Ok(())
    }

    /// Detaches a role from a membership.
    pub fn remove_role_from_membership(&self, membership: &MembershipId, role: &RoleId) {
        let mut memberships = self.inner.memberships.write().expect("poisoned lock");
        if let Some(record) = memberships.get_mut(membership) {
            record.role_ids.remove(role);
        }
    }

    /// Attaches a permission to a role.
    ///
    /// Fails if the permission is scoped to a different tenant than the
    /// role.
    pub fn add_permission_to_role(&self, role: &RoleId, permission: &PermissionId) -> Result<()> {
        let permissions = self.inner.permissions.read().expect("poisoned lock");
        let permission_record = permissions
            .get(permission)
            .ok_or_else(|| Error::InvalidId(format!("unknown permission '{permission}'")))?;
        let mut roles = self.inner.roles.write().expect("poisoned lock");
        let role_record = roles
            .get_mut(role)
            .ok_or_else(|| Error::InvalidId(format!("unknown role '{role}'")))?;
        if permission_record.tenant != role_record.tenant {
            return Err(Error::TenantMismatch(format!(
                "permission '{}' is scoped to tenant '{}', not '{}'",
                permission_record.codename, permission_record.tenant, role_record.tenant
            )));
        }
        role_record.permission_ids.insert(permission.clone());
        Ok(())
    }
}

#[async_trait]
impl TenantDirectory for MemoryStore {
    async fn find_tenant_by_slug(
        &self,
        slug: &str,
    ) -> std::result::Result<Option<Tenant>, StoreError> {
        let guard = self.inner.tenants.read().expect("poisoned lock");
        Ok(guard.values().find(|t| t.slug == slug).cloned())
    }

    async fn find_tenant_by_domain(
        &self,
        domain: &str,
    ) -> std::result::Result<Option<Tenant>, StoreError> {
        let guard = self.inner.tenants.read().expect("poisoned lock");
        Ok(guard
            .values()
            .find(|t| t.domain.as_deref() == Some(domain))
            .cloned())
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn find_active_membership(
        &self,
        principal: &PrincipalId,
        tenant: &TenantId,
    ) -> std::result::Result<Option<Membership>, StoreError> {
        let index = self.inner.membership_index.read().expect("poisoned lock");
        let Some(id) = index.get(&(principal.clone(), tenant.clone())) else {
            return Ok(None);
        };
        let memberships = self.inner.memberships.read().expect("poisoned lock");
        Ok(memberships.get(id).filter(|m| m.active).cloned())
    }

    async fn list_active_roles(
        &self,
        membership: &MembershipId,
    ) -> std::result::Result<Vec<Role>, StoreError> {
        let memberships = self.inner.memberships.read().expect("poisoned lock");
        let Some(record) = memberships.get(membership) else {
            return Ok(Vec::new());
        };
        let roles = self.inner.roles.read().expect("poisoned lock");
        Ok(record
            .role_ids
            .iter()
            .filter_map(|id| roles.get(id))
            .filter(|role| role.active)
            .cloned()
            .collect())
    }

    async fn list_permissions(
        &self,
        role: &RoleId,
    ) -> std::result::Result<Vec<PermissionRecord>, StoreError> {
        let roles = self.inner.roles.read().expect("poisoned lock");
        let Some(record) = roles.get(role) else {
            return Ok(Vec::new());
        };
        let permissions = self.inner.permissions.read().expect("poisoned lock");
        Ok(record
            .permission_ids
            .iter()
            .filter_map(|id| permissions.get(id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codename::Codename;
    use futures::executor::block_on;
    use std::collections::HashSet;

    fn tenant(slug: &str) -> Tenant {
        Tenant::new(TenantId::try_from(slug).unwrap(), slug.to_string(), slug)
    }

    fn role(id: &str, tenant: &Tenant) -> Role {
        Role {
            id: RoleId::try_from(id).unwrap(),
            tenant: tenant.id.clone(),
            name: id.to_string(),
            description: String::new(),
            permission_ids: HashSet::new(),
            active: true,
        }
    }

    fn membership(id: &str, principal: &str, tenant: &Tenant) -> Membership {
        Membership {
            id: MembershipId::try_from(id).unwrap(),
            principal: PrincipalId::try_from(principal).unwrap(),
            tenant: tenant.id.clone(),
            role_ids: HashSet::new(),
            active: true,
            joined_at_unix_ms: 0,
        }
    }

    #[test]
    fn membership_should_be_unique_per_principal_tenant_pair() {
        let store = MemoryStore::new();
        let acme = tenant("acme");
        store.insert_tenant(acme.clone());
        store.insert_membership(membership("m1", "u1", &acme));
        store.insert_membership(membership("m2", "u1", &acme));

        let found = block_on(store.find_active_membership(
            &PrincipalId::try_from("u1").unwrap(),
            &acme.id,
        ))
        .unwrap()
        .expect("membership");
        assert_eq!(found.id.as_str(), "m2");

        // The superseded record is gone entirely.
        let old = MembershipId::try_from("m1").unwrap();
        assert!(block_on(store.list_active_roles(&old)).unwrap().is_empty());
    }

    #[test]
    fn inactive_membership_should_not_be_found() {
        let store = MemoryStore::new();
        let acme = tenant("acme");
        store.insert_tenant(acme.clone());
        store.insert_membership(membership("m1", "u1", &acme));
        store.set_membership_active(&MembershipId::try_from("m1").unwrap(), false);

        let found = block_on(store.find_active_membership(
            &PrincipalId::try_from("u1").unwrap(),
            &acme.id,
        ))
        .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn cross_tenant_role_attachment_should_be_rejected() {
        let store = MemoryStore::new();
        let acme = tenant("acme");
        let globex = tenant("globex");
        store.insert_tenant(acme.clone());
        store.insert_tenant(globex.clone());
        store.insert_membership(membership("m1", "u1", &acme));
        store.insert_role(role("globex-admin", &globex));

        let result = store.add_role_to_membership(
            &MembershipId::try_from("m1").unwrap(),
            &RoleId::try_from("globex-admin").unwrap(),
        );
        assert!(matches!(result, Err(Error::TenantMismatch(_))));
    }

    #[test]
    fn cross_tenant_permission_attachment_should_be_rejected() {
        let store = MemoryStore::new();
        let acme = tenant("acme");
        let globex = tenant("globex");
        store.insert_tenant(acme.clone());
        store.insert_tenant(globex.clone());
        store.insert_role(role("manager", &acme));
        store.insert_permission(PermissionRecord {
            id: PermissionId::try_from("p1").unwrap(),
            tenant: globex.id.clone(),
            codename: Codename::try_from("orders.view_order").unwrap(),
            name: "View order".to_string(),
            description: String::new(),
        });

        let result = store.add_permission_to_role(
            &RoleId::try_from("manager").unwrap(),
            &PermissionId::try_from("p1").unwrap(),
        );
        assert!(matches!(result, Err(Error::TenantMismatch(_))));
    }

    #[test]
    fn list_active_roles_should_skip_deactivated_roles() {
        let store = MemoryStore::new();
        let acme = tenant("acme");
        store.insert_tenant(acme.clone());
        store.insert_membership(membership("m1", "u1", &acme));
        store.insert_role(role("manager", &acme));
        store.insert_role(role("viewer", &acme));
        let m1 = MembershipId::try_from("m1").unwrap();
        store
            .add_role_to_membership(&m1, &RoleId::try_from("manager").unwrap())
            .unwrap();
        store
            .add_role_to_membership(&m1, &RoleId::try_from("viewer").unwrap())
            .unwrap();
        store.set_role_active(&RoleId::try_from("viewer").unwrap(), false);

        let roles = block_on(store.list_active_roles(&m1)).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].id.as_str(), "manager");
    }

    #[test]
    fn tenant_lookup_should_match_slug_and_domain() {
        let store = MemoryStore::new();
        store.insert_tenant(tenant("acme").with_domain("acme.io"));

        let by_slug = block_on(store.find_tenant_by_slug("acme")).unwrap();
        assert!(by_slug.is_some());
        let by_domain = block_on(store.find_tenant_by_domain("acme.io")).unwrap();
        assert!(by_domain.is_some());
        assert!(block_on(store.find_tenant_by_slug("ghost")).unwrap().is_none());
    }
}

use crate::audit::{AuditEvent, Auditor};
use crate::cache::{NoCache, PermissionCache};
use crate::codename::Codename;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Membership, Principal, Role, Tenant, TenantOwned};
use crate::store::EntityStore;
use crate::types::{PrincipalId, RoleId, TenantId};
use std::collections::HashSet;

/// Permission Evaluation Engine.
///
/// Traverses the membership → role → permission graph for a (principal,
/// tenant) pair, read-through the configured [`PermissionCache`].
/// Deny-by-default: a missing or inactive membership, an inactive role, an
/// inactive tenant, and an unknown codename all evaluate to `false`. Only a
/// store failure surfaces as an error, so callers can fail closed.
#[derive(Debug)]
pub struct Engine<S, C = NoCache> {
    store: S,
    cache: C,
    superuser_bypass: bool,
    auditor: Auditor,
}

/// Builder for [`Engine`].
pub struct EngineBuilder<S, C = NoCache> {
    store: S,
    cache: C,
    superuser_bypass: bool,
    auditor: Auditor,
}

impl<S> EngineBuilder<S, NoCache> {
    /// Creates a new builder with default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: NoCache,
            superuser_bypass: true,
            auditor: Auditor::default(),
        }
    }
}

impl<S, C> EngineBuilder<S, C> {
    /// Enables or disables superuser bypass.
    pub fn superuser_bypass(mut self, on: bool) -> Self {
        self.superuser_bypass = on;
        self
    }

    /// Sets the audit emitter.
    pub fn auditor(mut self, auditor: Auditor) -> Self {
        self.auditor = auditor;
        self
    }

    /// Applies the bypass and audit options from a [`Config`].
    pub fn with_config(mut self, config: &Config) -> Self {
        self.superuser_bypass = config.superuser_bypass;
        self.auditor = self.auditor.with_enabled(config.audit_enabled);
        self
    }

    /// Sets the cache implementation.
    pub fn cache<C2: PermissionCache>(self, cache: C2) -> EngineBuilder<S, C2> {
        EngineBuilder {
            store: self.store,
            cache,
            superuser_bypass: self.superuser_bypass,
            auditor: self.auditor,
        }
    }

    /// Builds the engine.
    pub fn build(self) -> Engine<S, C> {
        Engine {
            store: self.store,
            cache: self.cache,
            superuser_bypass: self.superuser_bypass,
            auditor: self.auditor,
        }
    }
}

impl<S, C> Engine<S, C>
where
    S: EntityStore,
    C: PermissionCache,
{
    /// Checks whether a principal holds a permission within a tenant.
    pub async fn has_perm(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        codename: &Codename,
    ) -> Result<bool> {
        let (allowed, detail) = self.evaluate(principal, tenant, codename).await?;
        self.audit_check(principal, tenant, codename, allowed, detail);
        Ok(allowed)
    }

    /// Object-level variant of [`Engine::has_perm`].
    ///
    /// An object owned by a different tenant is denied before the superuser
    /// bypass is consulted, so a bypass can never read across tenants.
    pub async fn has_perm_on(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        codename: &Codename,
        object: &dyn TenantOwned,
    ) -> Result<bool> {
        if object.owner_tenant() != &tenant.id {
            self.audit_check(principal, tenant, codename, false, "object_tenant_mismatch");
            return Ok(false);
        }
        self.has_perm(principal, tenant, codename).await
    }

    /// Checks that a principal holds every listed permission.
    ///
    /// Short-circuits on the first denial.
    pub async fn has_perms(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        codenames: &[Codename],
    ) -> Result<bool> {
        for codename in codenames {
            if !self.has_perm(principal, tenant, codename).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Checks that a principal holds at least one listed permission.
    pub async fn has_any_perm(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        codenames: &[Codename],
    ) -> Result<bool> {
        for codename in codenames {
            if self.has_perm(principal, tenant, codename).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Checks whether the principal holds a role within the tenant.
    ///
    /// Same gate order as [`Engine::has_perm`]: an inactive tenant denies,
    /// then the configurable superuser bypass, then the active membership's
    /// active roles are consulted.
    pub async fn has_role(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        role: &RoleId,
    ) -> Result<bool> {
        if !tenant.active {
            return Ok(false);
        }
        if self.superuser_bypass && principal.superuser {
            return Ok(true);
        }
        let roles = self.get_roles(principal, tenant).await?;
        Ok(roles.iter().any(|held| held.id == *role))
    }

    /// Returns the active roles the principal holds in the tenant.
    ///
    /// Introspection path, uncached.
    pub async fn get_roles(&self, principal: &Principal, tenant: &Tenant) -> Result<Vec<Role>> {
        match self.active_membership(&principal.id, &tenant.id).await? {
            Some(membership) => self
                .store
                .list_active_roles(&membership.id)
                .await
                .map_err(Error::from),
            None => Ok(Vec::new()),
        }
    }

    /// Returns the full computed permission set for the principal.
    ///
    /// Superuser bypass does not expand this set; it only bypasses the
    /// check itself. Introspection and enforcement are different
    /// operations.
    pub async fn get_all_permissions(
        &self,
        principal: &Principal,
        tenant: &Tenant,
    ) -> Result<HashSet<Codename>> {
        self.permission_set(&principal.id, &tenant.id).await
    }

    /// Returns whether the principal has an active membership in the tenant.
    pub async fn is_member(&self, principal: &Principal, tenant: &Tenant) -> Result<bool> {
        Ok(self
            .active_membership(&principal.id, &tenant.id)
            .await?
            .is_some())
    }

    /// Returns whether superuser bypass is enabled.
    pub(crate) fn bypass_enabled(&self) -> bool {
        self.superuser_bypass
    }

    async fn evaluate(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        codename: &Codename,
    ) -> Result<(bool, &'static str)> {
        // An inactive tenant is treated like an unresolved one; even a
        // superuser cannot act inside it.
        if !tenant.active {
            return Ok((false, "tenant_inactive"));
        }
        if self.superuser_bypass && principal.superuser {
            return Ok((true, "superuser_bypass"));
        }
        let permissions = self.permission_set(&principal.id, &tenant.id).await?;
        if permissions.contains(codename) {
            Ok((true, "granted"))
        } else {
            Ok((false, "denied"))
        }
    }

    pub(crate) async fn active_membership(
        &self,
        principal: &PrincipalId,
        tenant: &TenantId,
    ) -> Result<Option<Membership>> {
        self.store
            .find_active_membership(principal, tenant)
            .await
            .map_err(Error::from)
    }

    /// Computes the permission set, read-through the cache.
    pub(crate) async fn permission_set(
        &self,
        principal: &PrincipalId,
        tenant: &TenantId,
    ) -> Result<HashSet<Codename>> {
        if let Some(cached) = self.cache.get(tenant, principal).await {
            return Ok(cached);
        }
        let computed = self.compute_permission_set(principal, tenant).await?;
        self.cache.put(tenant, principal, computed.clone()).await;
        Ok(computed)
    }

    async fn compute_permission_set(
        &self,
        principal: &PrincipalId,
        tenant: &TenantId,
    ) -> Result<HashSet<Codename>> {
        let Some(membership) = self.active_membership(principal, tenant).await? else {
            return Ok(HashSet::new());
        };

        let mut permissions = HashSet::new();
        let roles = self
            .store
            .list_active_roles(&membership.id)
            .await
            .map_err(Error::from)?;
        for role in roles {
            let records = self
                .store
                .list_permissions(&role.id)
                .await
                .map_err(Error::from)?;
            for record in records {
                // Permissions are strictly namespaced per tenant; a record
                // scoped elsewhere never contributes to this set.
                if record.tenant == *tenant {
                    permissions.insert(record.codename);
                }
            }
        }
        Ok(permissions)
    }

    pub(crate) fn audit_check(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        codename: &Codename,
        allowed: bool,
        detail: &'static str,
    ) {
        self.auditor.emit(AuditEvent::permission_check(
            principal.id.clone(),
            tenant.id.clone(),
            codename.clone(),
            allowed,
            detail,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::model::PermissionRecord;
    use crate::store::{MembershipStore, TenantDirectory};
    use crate::types::{MembershipId, PermissionId, RoleId};
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::collections::HashMap;

    #[derive(Default, Clone)]
    struct TestStore {
        tenants: Vec<Tenant>,
        memberships: Vec<Membership>,
        roles: HashMap<MembershipId, Vec<Role>>,
        permissions: HashMap<RoleId, Vec<PermissionRecord>>,
    }

    #[async_trait]
    impl TenantDirectory for TestStore {
        async fn find_tenant_by_slug(
            &self,
            slug: &str,
        ) -> std::result::Result<Option<Tenant>, StoreError> {
            Ok(self.tenants.iter().find(|t| t.slug == slug).cloned())
        }

        async fn find_tenant_by_domain(
            &self,
            domain: &str,
        ) -> std::result::Result<Option<Tenant>, StoreError> {
            Ok(self
                .tenants
                .iter()
                .find(|t| t.domain.as_deref() == Some(domain))
                .cloned())
        }
    }

    #[async_trait]
    impl MembershipStore for TestStore {
        async fn find_active_membership(
            &self,
            principal: &PrincipalId,
            tenant: &TenantId,
        ) -> std::result::Result<Option<Membership>, StoreError> {
            Ok(self
                .memberships
                .iter()
                .find(|m| m.principal == *principal && m.tenant == *tenant && m.active)
                .cloned())
        }

        async fn list_active_roles(
            &self,
            membership: &MembershipId,
        ) -> std::result::Result<Vec<Role>, StoreError> {
            Ok(self
                .roles
                .get(membership)
                .map(|roles| roles.iter().filter(|r| r.active).cloned().collect())
                .unwrap_or_default())
        }

        async fn list_permissions(
            &self,
            role: &RoleId,
        ) -> std::result::Result<Vec<PermissionRecord>, StoreError> {
            Ok(self.permissions.get(role).cloned().unwrap_or_default())
        }
    }

    fn tenant(slug: &str) -> Tenant {
        Tenant::new(TenantId::try_from(slug).unwrap(), slug.to_string(), slug)
    }

    fn principal(id: &str) -> Principal {
        Principal::new(PrincipalId::try_from(id).unwrap())
    }

    fn codename(value: &str) -> Codename {
        Codename::try_from(value).unwrap()
    }

    fn permission_record(tenant: &Tenant, id: &str, value: &str) -> PermissionRecord {
        PermissionRecord {
            id: PermissionId::try_from(id).unwrap(),
            tenant: tenant.id.clone(),
            codename: codename(value),
            name: value.to_string(),
            description: String::new(),
        }
    }

    /// Store with one tenant, one membership, role "manager" granting
    /// `orders.view_order`.
    fn granted_store(tenant: &Tenant, principal: &Principal) -> TestStore {
        let membership_id = MembershipId::try_from("m1").unwrap();
        let role_id = RoleId::try_from("manager").unwrap();
        let mut store = TestStore {
            tenants: vec![tenant.clone()],
            memberships: vec![Membership {
                id: membership_id.clone(),
                principal: principal.id.clone(),
                tenant: tenant.id.clone(),
                role_ids: [role_id.clone()].into_iter().collect(),
                active: true,
                joined_at_unix_ms: 0,
            }],
            ..TestStore::default()
        };
        store.roles.insert(
            membership_id,
            vec![Role {
                id: role_id.clone(),
                tenant: tenant.id.clone(),
                name: "Manager".to_string(),
                description: String::new(),
                permission_ids: HashSet::new(),
                active: true,
            }],
        );
        store.permissions.insert(
            role_id,
            vec![permission_record(tenant, "p1", "orders.view_order")],
        );
        store
    }

    fn engine(store: TestStore) -> Engine<TestStore> {
        EngineBuilder::new(store).auditor(Auditor::disabled()).build()
    }

    #[test]
    fn has_perm_should_allow_granted_codename() {
        let tenant = tenant("acme");
        let user = principal("u1");
        let engine = engine(granted_store(&tenant, &user));

        let allowed =
            block_on(engine.has_perm(&user, &tenant, &codename("orders.view_order"))).unwrap();
        assert!(allowed);
    }

    #[test]
    fn has_perm_should_deny_unknown_codename() {
        let tenant = tenant("acme");
        let user = principal("u1");
        let engine = engine(granted_store(&tenant, &user));

        let allowed =
            block_on(engine.has_perm(&user, &tenant, &codename("orders.delete_order"))).unwrap();
        assert!(!allowed);
    }

    #[test]
    fn has_perm_should_deny_without_membership() {
        let tenant = tenant("acme");
        let member = principal("u1");
        let stranger = principal("u2");
        let engine = engine(granted_store(&tenant, &member));

        let allowed =
            block_on(engine.has_perm(&stranger, &tenant, &codename("orders.view_order"))).unwrap();
        assert!(!allowed);
    }

    #[test]
    fn has_perm_should_deny_inactive_membership() {
        let tenant = tenant("acme");
        let user = principal("u1");
        let mut store = granted_store(&tenant, &user);
        store.memberships[0].active = false;
        let engine = engine(store);

        let allowed =
            block_on(engine.has_perm(&user, &tenant, &codename("orders.view_order"))).unwrap();
        assert!(!allowed);
        assert!(!block_on(engine.is_member(&user, &tenant)).unwrap());
    }

    #[test]
    fn has_perm_should_deny_when_role_deactivated() {
        let tenant = tenant("acme");
        let user = principal("u1");
        let mut store = granted_store(&tenant, &user);
        for roles in store.roles.values_mut() {
            for role in roles.iter_mut() {
                role.active = false;
            }
        }
        let engine = engine(store);

        let allowed =
            block_on(engine.has_perm(&user, &tenant, &codename("orders.view_order"))).unwrap();
        assert!(!allowed);
    }

    #[test]
    fn has_perm_should_deny_inactive_tenant_even_for_superuser() {
        let tenant = tenant("acme").with_active(false);
        let root = Principal::superuser(PrincipalId::try_from("root").unwrap());
        let engine = engine(granted_store(&tenant, &root));

        let allowed =
            block_on(engine.has_perm(&root, &tenant, &codename("orders.view_order"))).unwrap();
        assert!(!allowed);
    }

    #[test]
    fn superuser_should_bypass_check_but_not_introspection() {
        let tenant = tenant("acme");
        let root = Principal::superuser(PrincipalId::try_from("root").unwrap());
        // Root has no membership at all.
        let engine = engine(TestStore {
            tenants: vec![tenant.clone()],
            ..TestStore::default()
        });

        let allowed =
            block_on(engine.has_perm(&root, &tenant, &codename("orders.view_order"))).unwrap();
        assert!(allowed);

        let all = block_on(engine.get_all_permissions(&root, &tenant)).unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn superuser_bypass_should_respect_configuration() {
        let tenant = tenant("acme");
        let root = Principal::superuser(PrincipalId::try_from("root").unwrap());
        let store = TestStore {
            tenants: vec![tenant.clone()],
            ..TestStore::default()
        };
        let engine = EngineBuilder::new(store)
            .superuser_bypass(false)
            .auditor(Auditor::disabled())
            .build();

        let allowed =
            block_on(engine.has_perm(&root, &tenant, &codename("orders.view_order"))).unwrap();
        assert!(!allowed);
    }

    #[test]
    fn cross_tenant_codename_should_never_match() {
        let tenant_a = tenant("acme");
        let tenant_b = tenant("globex");
        let user = principal("u1");

        // Member of both tenants but the grant exists only under A.
        let mut store = granted_store(&tenant_a, &user);
        store.tenants.push(tenant_b.clone());
        let membership_b = MembershipId::try_from("m2").unwrap();
        store.memberships.push(Membership {
            id: membership_b.clone(),
            principal: user.id.clone(),
            tenant: tenant_b.id.clone(),
            role_ids: HashSet::new(),
            active: true,
            joined_at_unix_ms: 0,
        });
        store.roles.insert(membership_b, Vec::new());
        let engine = engine(store);

        assert!(
            block_on(engine.has_perm(&user, &tenant_a, &codename("orders.view_order"))).unwrap()
        );
        assert!(
            !block_on(engine.has_perm(&user, &tenant_b, &codename("orders.view_order"))).unwrap()
        );
    }

    #[test]
    fn mis_scoped_permission_record_should_not_contribute() {
        let tenant_a = tenant("acme");
        let tenant_b = tenant("globex");
        let user = principal("u1");
        let mut store = granted_store(&tenant_a, &user);
        // Corrupt grant: a role under A pointing at a permission scoped to B.
        for records in store.permissions.values_mut() {
            for record in records.iter_mut() {
                record.tenant = tenant_b.id.clone();
            }
        }
        let engine = engine(store);

        let allowed =
            block_on(engine.has_perm(&user, &tenant_a, &codename("orders.view_order"))).unwrap();
        assert!(!allowed);
    }

    #[test]
    fn has_perm_on_should_deny_foreign_object_even_for_superuser() {
        struct Order {
            tenant: TenantId,
        }
        impl TenantOwned for Order {
            fn owner_tenant(&self) -> &TenantId {
                &self.tenant
            }
        }

        let tenant_a = tenant("acme");
        let root = Principal::superuser(PrincipalId::try_from("root").unwrap());
        let engine = engine(TestStore {
            tenants: vec![tenant_a.clone()],
            ..TestStore::default()
        });

        let foreign = Order {
            tenant: TenantId::try_from("globex").unwrap(),
        };
        let local = Order {
            tenant: tenant_a.id.clone(),
        };
        let view = codename("orders.view_order");

        assert!(!block_on(engine.has_perm_on(&root, &tenant_a, &view, &foreign)).unwrap());
        assert!(block_on(engine.has_perm_on(&root, &tenant_a, &view, &local)).unwrap());
    }

    #[test]
    fn has_perms_should_require_every_codename() {
        let tenant = tenant("acme");
        let user = principal("u1");
        let engine = engine(granted_store(&tenant, &user));

        let both = [codename("orders.view_order"), codename("orders.add_order")];
        assert!(!block_on(engine.has_perms(&user, &tenant, &both)).unwrap());

        let held = [codename("orders.view_order")];
        assert!(block_on(engine.has_perms(&user, &tenant, &held)).unwrap());
        assert!(block_on(engine.has_perms(&user, &tenant, &[])).unwrap());
    }

    #[test]
    fn has_any_perm_should_accept_one_held_codename() {
        let tenant = tenant("acme");
        let user = principal("u1");
        let engine = engine(granted_store(&tenant, &user));

        let mixed = [codename("orders.add_order"), codename("orders.view_order")];
        assert!(block_on(engine.has_any_perm(&user, &tenant, &mixed)).unwrap());
        assert!(!block_on(engine.has_any_perm(&user, &tenant, &[])).unwrap());
    }

    #[test]
    fn has_role_should_match_held_active_roles_only() {
        let tenant = tenant("acme");
        let user = principal("u1");
        let engine = engine(granted_store(&tenant, &user));

        let manager = RoleId::try_from("manager").unwrap();
        let admin = RoleId::try_from("admin").unwrap();
        assert!(block_on(engine.has_role(&user, &tenant, &manager)).unwrap());
        assert!(!block_on(engine.has_role(&user, &tenant, &admin)).unwrap());

        let stranger = principal("u2");
        assert!(!block_on(engine.has_role(&stranger, &tenant, &manager)).unwrap());
    }

    #[test]
    fn has_role_should_honor_superuser_bypass_configuration() {
        let tenant = tenant("acme");
        let root = Principal::superuser(PrincipalId::try_from("root").unwrap());
        let store = TestStore {
            tenants: vec![tenant.clone()],
            ..TestStore::default()
        };
        let admin = RoleId::try_from("admin").unwrap();

        let engine = engine(store.clone());
        assert!(block_on(engine.has_role(&root, &tenant, &admin)).unwrap());

        let strict = EngineBuilder::new(store)
            .superuser_bypass(false)
            .auditor(Auditor::disabled())
            .build();
        assert!(!block_on(strict.has_role(&root, &tenant, &admin)).unwrap());
    }

    #[test]
    fn get_roles_should_return_only_active_roles() {
        let tenant = tenant("acme");
        let user = principal("u1");
        let mut store = granted_store(&tenant, &user);
        let membership_id = store.memberships[0].id.clone();
        store.roles.get_mut(&membership_id).unwrap().push(Role {
            id: RoleId::try_from("auditor").unwrap(),
            tenant: tenant.id.clone(),
            name: "Auditor".to_string(),
            description: String::new(),
            permission_ids: HashSet::new(),
            active: false,
        });
        let engine = engine(store);

        let roles = block_on(engine.get_roles(&user, &tenant)).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].name, "Manager");
    }

    #[test]
    fn store_failure_should_surface_as_error() {
        struct BrokenStore;

        #[async_trait]
        impl TenantDirectory for BrokenStore {
            async fn find_tenant_by_slug(
                &self,
                _slug: &str,
            ) -> std::result::Result<Option<Tenant>, StoreError> {
                Err("store offline".into())
            }

            async fn find_tenant_by_domain(
                &self,
                _domain: &str,
            ) -> std::result::Result<Option<Tenant>, StoreError> {
                Err("store offline".into())
            }
        }

        #[async_trait]
        impl MembershipStore for BrokenStore {
            async fn find_active_membership(
                &self,
                _principal: &PrincipalId,
                _tenant: &TenantId,
            ) -> std::result::Result<Option<Membership>, StoreError> {
                Err("store offline".into())
            }

            async fn list_active_roles(
                &self,
                _membership: &MembershipId,
            ) -> std::result::Result<Vec<Role>, StoreError> {
                Err("store offline".into())
            }

            async fn list_permissions(
                &self,
                _role: &RoleId,
            ) -> std::result::Result<Vec<PermissionRecord>, StoreError> {
                Err("store offline".into())
            }
        }

        let tenant = tenant("acme");
        let user = principal("u1");
        let engine = EngineBuilder::new(BrokenStore)
            .auditor(Auditor::disabled())
            .build();

        let result = block_on(engine.has_perm(&user, &tenant, &codename("orders.view_order")));
        assert!(matches!(result, Err(Error::Store(_))));
    }
}

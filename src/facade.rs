use crate::cache::PermissionCache;
use crate::codename::Codename;
use crate::error::Result;
use crate::model::{Principal, Role, Tenant, TenantOwned};
use crate::engine::Engine;
use crate::store::EntityStore;
use crate::types::RoleId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Graph snapshot computed on first access and held for the facade's
/// lifetime.
#[derive(Debug, Clone)]
struct Snapshot {
    member: bool,
    roles: Vec<Role>,
    permissions: HashSet<Codename>,
}

/// Request-Scoped Authorization Facade.
///
/// Built once per request from the authenticated principal and the bound
/// tenant. All permission lookups during the request observe the same
/// membership/role/permission set, computed at first access — store
/// mutations committed mid-request become visible to new requests only.
/// Safe to call repeatedly and in any order.
pub struct TenantUser<S, C> {
    engine: Arc<Engine<S, C>>,
    principal: Principal,
    tenant: Tenant,
    snapshot: Mutex<Option<Arc<Snapshot>>>,
}

impl<S, C> TenantUser<S, C>
where
    S: EntityStore,
    C: PermissionCache,
{
    /// Creates the facade for one request.
    pub fn new(engine: Arc<Engine<S, C>>, principal: Principal, tenant: Tenant) -> Self {
        Self {
            engine,
            principal,
            tenant,
            snapshot: Mutex::new(None),
        }
    }

    /// Returns the principal this facade was built for.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Returns the bound tenant.
    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    /// Returns whether the principal is a superuser.
    pub fn is_superuser(&self) -> bool {
        self.principal.superuser
    }

    /// Checks a permission against the request snapshot.
    pub async fn has_perm(&self, codename: &Codename) -> Result<bool> {
        let (allowed, detail) = self.check(codename).await?;
        self.engine
            .audit_check(&self.principal, &self.tenant, codename, allowed, detail);
        Ok(allowed)
    }

    /// Object-level variant of [`TenantUser::has_perm`].
    ///
    /// An object owned by a different tenant is always denied, superuser or
    /// not.
    pub async fn has_perm_on(&self, codename: &Codename, object: &dyn TenantOwned) -> Result<bool> {
        if object.owner_tenant() != &self.tenant.id {
            self.engine.audit_check(
                &self.principal,
                &self.tenant,
                codename,
                false,
                "object_tenant_mismatch",
            );
            return Ok(false);
        }
        self.has_perm(codename).await
    }

    /// Checks that every listed permission is held; short-circuits on the
    /// first denial.
    pub async fn has_perms(&self, codenames: &[Codename]) -> Result<bool> {
        for codename in codenames {
            if !self.has_perm(codename).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Checks that at least one listed permission is held.
    pub async fn has_any_perm(&self, codenames: &[Codename]) -> Result<bool> {
        for codename in codenames {
            if self.has_perm(codename).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Checks whether the principal holds a role, against the snapshot.
    ///
    /// Same gate order as [`TenantUser::has_perm`]: inactive tenant, then
    /// superuser bypass, then the snapshot's roles.
    pub async fn has_role(&self, role: &RoleId) -> Result<bool> {
        if !self.tenant.active {
            return Ok(false);
        }
        if self.engine.bypass_enabled() && self.principal.superuser {
            return Ok(true);
        }
        let snapshot = self.snapshot().await?;
        Ok(snapshot.member && snapshot.roles.iter().any(|held| held.id == *role))
    }

    /// Returns the active roles from the snapshot.
    pub async fn get_roles(&self) -> Result<Vec<Role>> {
        Ok(self.snapshot().await?.roles.clone())
    }

    /// Returns the snapshot's permission set.
    ///
    /// Superuser bypass does not inflate this set.
    pub async fn get_all_permissions(&self) -> Result<HashSet<Codename>> {
        Ok(self.snapshot().await?.permissions.clone())
    }

    /// Returns whether the principal holds an active membership.
    pub async fn is_member(&self) -> Result<bool> {
        Ok(self.snapshot().await?.member)
    }

    async fn check(&self, codename: &Codename) -> Result<(bool, &'static str)> {
        if !self.tenant.active {
            return Ok((false, "tenant_inactive"));
        }
        if self.engine.bypass_enabled() && self.principal.superuser {
            return Ok((true, "superuser_bypass"));
        }
        let snapshot = self.snapshot().await?;
        if !snapshot.member {
            return Ok((false, "not_a_member"));
        }
        if snapshot.permissions.contains(codename) {
            Ok((true, "granted"))
        } else {
            Ok((false, "denied"))
        }
    }

    async fn snapshot(&self) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.snapshot.lock().expect("poisoned lock").clone() {
            return Ok(snapshot);
        }
        let loaded = Arc::new(self.load_snapshot().await?);
        let mut guard = self.snapshot.lock().expect("poisoned lock");
        Ok(guard.get_or_insert(loaded).clone())
    }

    async fn load_snapshot(&self) -> Result<Snapshot> {
        if self
            .engine
            .active_membership(&self.principal.id, &self.tenant.id)
            .await?
            .is_none()
        {
            return Ok(Snapshot {
                member: false,
                roles: Vec::new(),
                permissions: HashSet::new(),
            });
        }

        let roles = self.engine.get_roles(&self.principal, &self.tenant).await?;
        let permissions = self
            .engine
            .permission_set(&self.principal.id, &self.tenant.id)
            .await?;
        Ok(Snapshot {
            member: true,
            roles,
            permissions,
        })
    }
}

impl<S, C> std::fmt::Debug for TenantUser<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantUser")
            .field("principal", &self.principal.id)
            .field("tenant", &self.tenant.slug)
            .finish()
    }
}

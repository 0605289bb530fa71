use crate::codename::Codename;
use crate::types::{MembershipId, PermissionId, PrincipalId, RoleId, TenantId};
use std::collections::{HashMap, HashSet};

/// Isolated unit of the application's data and permission space.
///
/// Slug and domain are normalized to lowercase; the slug is the primary
/// resolution key and is immutable after creation. Tenants are never hard
/// deleted in normal operation, only deactivated.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    pub domain: Option<String>,
    pub active: bool,
    pub metadata: HashMap<String, String>,
}

impl Tenant {
    /// Creates an active tenant with normalized slug.
    pub fn new(id: TenantId, name: impl Into<String>, slug: impl AsRef<str>) -> Self {
        Self {
            id,
            name: name.into(),
            slug: slug.as_ref().trim().to_ascii_lowercase(),
            domain: None,
            active: true,
            metadata: HashMap::new(),
        }
    }

    /// Sets the tenant's custom domain, normalized to lowercase.
    pub fn with_domain(mut self, domain: impl AsRef<str>) -> Self {
        self.domain = Some(domain.as_ref().trim().to_ascii_lowercase());
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Binding of a principal to a tenant, carrying that principal's roles.
///
/// At most one membership exists per (principal, tenant) pair. Revocation
/// deactivates the record instead of deleting it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Membership {
    pub id: MembershipId,
    pub principal: PrincipalId,
    pub tenant: TenantId,
    pub role_ids: HashSet<RoleId>,
    pub active: bool,
    pub joined_at_unix_ms: u64,
}

/// Named, tenant-scoped bundle of permissions.
///
/// Deactivating a role removes its grant from every holder without
/// deleting the record.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Role {
    pub id: RoleId,
    pub tenant: TenantId,
    pub name: String,
    pub description: String,
    pub permission_ids: HashSet<PermissionId>,
    pub active: bool,
}

/// Atomic, tenant-scoped grantable capability.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PermissionRecord {
    pub id: PermissionId,
    pub tenant: TenantId,
    pub codename: Codename,
    pub name: String,
    pub description: String,
}

/// Minimal view of the authenticated identity owned by the external auth
/// subsystem. The superuser flag is consulted for configurable bypass.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Principal {
    pub id: PrincipalId,
    pub superuser: bool,
}

impl Principal {
    /// Creates a regular (non-superuser) principal.
    pub fn new(id: PrincipalId) -> Self {
        Self {
            id,
            superuser: false,
        }
    }

    /// Creates a superuser principal.
    pub fn superuser(id: PrincipalId) -> Self {
        Self {
            id,
            superuser: true,
        }
    }
}

/// Seam for object-level permission checks.
///
/// An object owned by a different tenant is always denied regardless of
/// codename match, including for superusers.
pub trait TenantOwned {
    /// Returns the tenant the object belongs to.
    fn owner_tenant(&self) -> &TenantId;
}

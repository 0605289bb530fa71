use crate::audit::{AuditEvent, Auditor};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::Tenant;
use crate::request::RequestMeta;
use crate::resolver::{CompiledResolver, LookupKey};
use crate::store::TenantDirectory;
use regex::Regex;

/// Outcome of tenant resolution for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A tenant was identified and is active.
    Bound(Tenant),
    /// The request path is exempt from resolution.
    Exempt,
    /// No tenant could be determined. Missing identification, an unknown
    /// tenant, and an inactive tenant are deliberately indistinguishable
    /// here so probes cannot learn tenant existence or state.
    Unresolved,
}

impl Resolution {
    /// Returns the bound tenant, if any.
    pub fn tenant(&self) -> Option<&Tenant> {
        match self {
            Self::Bound(tenant) => Some(tenant),
            _ => None,
        }
    }
}

/// Tenant Resolution Engine.
///
/// Orchestrates exemption checks, the single configured resolver strategy,
/// and audit emission. Construction validates the configuration; an invalid
/// setup must prevent the system from serving requests.
#[derive(Debug)]
pub struct ResolutionEngine<S> {
    store: S,
    resolver: CompiledResolver,
    exempt_patterns: Vec<Regex>,
    auditor: Auditor,
}

impl<S> ResolutionEngine<S>
where
    S: TenantDirectory + Send + Sync,
{
    /// Compiles the configuration into a resolution engine.
    ///
    /// Fails with [`Error::Config`] on an invalid strategy setup or an
    /// uncompilable exempt pattern.
    pub fn new(store: S, config: &Config, auditor: Auditor) -> Result<Self> {
        let resolver = CompiledResolver::from_config(config)?;
        let exempt_patterns = config
            .exempt_url_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|err| Error::Config(format!("invalid exempt pattern '{pattern}': {err}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            store,
            resolver,
            exempt_patterns,
            auditor: auditor.with_enabled(config.audit_enabled),
        })
    }

    /// Resolves the tenant for a request.
    ///
    /// Exemption runs first and skips the resolver entirely. A store
    /// failure propagates as [`Error::Store`] so the caller can fail
    /// closed; every other miss is the recoverable [`Resolution::Unresolved`].
    pub async fn resolve(&self, meta: &RequestMeta) -> Result<Resolution> {
        if self.is_exempt(meta.path()) {
            self.audit(None, true, "exempt");
            return Ok(Resolution::Exempt);
        }

        let Some(key) = self.resolver.extract(meta) else {
            self.audit(None, false, "unresolved");
            return Ok(Resolution::Unresolved);
        };

        let tenant = match key {
            LookupKey::Slug(slug) => self
                .store
                .find_tenant_by_slug(&slug)
                .await
                .map_err(Error::from)?,
            LookupKey::Domain(domain) => self
                .store
                .find_tenant_by_domain(&domain)
                .await
                .map_err(Error::from)?,
        };

        match tenant {
            Some(tenant) if tenant.active => {
                self.audit(Some(tenant.id.clone()), true, "bound");
                Ok(Resolution::Bound(tenant))
            }
            _ => {
                self.audit(None, false, "unresolved");
                Ok(Resolution::Unresolved)
            }
        }
    }

    fn is_exempt(&self, path: &str) -> bool {
        self.exempt_patterns
            .iter()
            .any(|pattern| pattern.is_match(path))
    }

    fn audit(&self, tenant: Option<crate::types::TenantId>, outcome: bool, detail: &'static str) {
        self.auditor.emit(AuditEvent::resolution(
            tenant,
            outcome,
            detail,
            self.resolver.strategy().as_str(),
        ));
    }
}

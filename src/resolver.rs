use crate::config::{Config, Strategy};
use crate::error::{Error, Result};
use regex::Regex;

/// Tenant lookup key extracted from request metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LookupKey {
    /// Look the tenant up by slug.
    Slug(String),
    /// Look the tenant up by custom domain.
    Domain(String),
}

/// Compiled resolver strategy.
///
/// Construction validates the configuration for the selected strategy;
/// extraction is pure and never touches the store.
#[derive(Debug)]
pub(crate) enum CompiledResolver {
    Domain,
    Subdomain { base_domain: String },
    Path { pattern: Regex },
    Header { name: String },
}

impl CompiledResolver {
    pub(crate) fn from_config(config: &Config) -> Result<Self> {
        match config.strategy {
            Strategy::Domain => Ok(Self::Domain),
            Strategy::Subdomain => {
                let base = config
                    .base_domain
                    .as_deref()
                    .map(str::trim)
                    .filter(|base| !base.is_empty())
                    .ok_or_else(|| {
                        Error::Config(
                            "base_domain must be set for the subdomain strategy".to_string(),
                        )
                    })?;
                Ok(Self::Subdomain {
                    base_domain: base.to_ascii_lowercase(),
                })
            }
            Strategy::Path => {
                let pattern = Regex::new(&config.path_pattern).map_err(|err| {
                    Error::Config(format!("invalid path_pattern: {err}"))
                })?;
                if !pattern
                    .capture_names()
                    .any(|name| name == Some("tenant_slug"))
                {
                    return Err(Error::Config(
                        "path_pattern must contain a named group 'tenant_slug'".to_string(),
                    ));
                }
                Ok(Self::Path { pattern })
            }
            Strategy::Header => {
                let name = config.header_name.trim();
                if name.is_empty() {
                    return Err(Error::Config(
                        "header_name must be set for the header strategy".to_string(),
                    ));
                }
                Ok(Self::Header {
                    name: name.to_ascii_lowercase(),
                })
            }
        }
    }

    /// Returns the strategy this resolver was compiled from.
    pub(crate) fn strategy(&self) -> Strategy {
        match self {
            Self::Domain => Strategy::Domain,
            Self::Subdomain { .. } => Strategy::Subdomain,
            Self::Path { .. } => Strategy::Path,
            Self::Header { .. } => Strategy::Header,
        }
    }

    /// Extracts the tenant lookup key from request metadata.
    ///
    /// `None` means the request carries no usable tenant identification;
    /// callers collapse this with "tenant not found" so probes cannot
    /// distinguish the two.
    pub(crate) fn extract(&self, meta: &crate::request::RequestMeta) -> Option<LookupKey> {
        match self {
            Self::Domain => {
                let host = normalized_host(meta.host()?)?;
                Some(LookupKey::Domain(host))
            }
            Self::Subdomain { base_domain } => {
                let host = normalized_host(meta.host()?)?;
                let label = subdomain_label(&host, base_domain)?;
                Some(LookupKey::Slug(label))
            }
            Self::Path { pattern } => {
                let captures = pattern.captures(meta.path())?;
                let slug = captures.name("tenant_slug")?.as_str();
                if slug.is_empty() {
                    return None;
                }
                Some(LookupKey::Slug(slug.to_ascii_lowercase()))
            }
            Self::Header { name } => {
                let value = meta.header(name)?.trim();
                if value.is_empty() {
                    return None;
                }
                Some(LookupKey::Slug(value.to_ascii_lowercase()))
            }
        }
    }
}

/// Lowercases the host and strips a trailing `:port`.
fn normalized_host(host: &str) -> Option<String> {
    let host = host.trim();
    if host.is_empty() {
        return None;
    }
    let host = host.split(':').next().unwrap_or(host);
    Some(host.to_ascii_lowercase())
}

/// Returns the first subdomain label of `host` under `base_domain`.
///
/// `acme.example.com` under `example.com` yields `acme`; nested hosts such
/// as `api.acme.example.com` yield `api`. The bare base domain has no label.
fn subdomain_label(host: &str, base_domain: &str) -> Option<String> {
    let prefix = host.strip_suffix(base_domain)?.strip_suffix('.')?;
    let label = prefix.split('.').next().unwrap_or(prefix);
    if label.is_empty() {
        return None;
    }
    Some(label.to_string())
}

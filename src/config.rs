/// Tenant resolution strategy. Exactly one strategy is active per
/// deployment; strategies are not combined or chained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Strategy {
    /// Exact match of the request host against a tenant's domain.
    Domain,
    /// Strip the configured base domain from the host to obtain a slug.
    Subdomain,
    /// Apply the configured path pattern; named group `tenant_slug`.
    Path,
    /// Read the configured header and treat its value as the slug.
    Header,
}

impl Strategy {
    /// Returns the stable strategy name used in audit events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Subdomain => "subdomain",
            Self::Path => "path",
            Self::Header => "header",
        }
    }
}

/// Recognized configuration options.
///
/// Validation is deferred to engine construction so that an invalid setup
/// (e.g. subdomain strategy with no base domain, or a path pattern missing
/// the `tenant_slug` group) fails at initialization instead of degrading
/// silently at request time.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Active resolution strategy.
    pub strategy: Strategy,
    /// Base domain for subdomain extraction (e.g. `example.com`).
    pub base_domain: Option<String>,
    /// Path pattern with a named capture group `tenant_slug`.
    pub path_pattern: String,
    /// Header carrying the tenant slug, matched case-insensitively.
    pub header_name: String,
    /// Request paths matching any of these patterns skip resolution.
    pub exempt_url_patterns: Vec<String>,
    /// Whether superusers bypass permission checks.
    pub superuser_bypass: bool,
    /// Whether audit events are emitted.
    pub audit_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: Strategy::Domain,
            base_domain: None,
            path_pattern: r"^/(?P<tenant_slug>[\w-]+)/".to_string(),
            header_name: "x-tenant-slug".to_string(),
            exempt_url_patterns: Vec::new(),
            superuser_bypass: true,
            audit_enabled: true,
        }
    }
}

impl Config {
    /// Creates a default configuration for the given strategy.
    pub fn for_strategy(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Sets the base domain used by the subdomain strategy.
    pub fn base_domain(mut self, domain: impl Into<String>) -> Self {
        self.base_domain = Some(domain.into());
        self
    }

    /// Sets the path pattern used by the path strategy.
    pub fn path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.path_pattern = pattern.into();
        self
    }

    /// Sets the header name used by the header strategy.
    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    /// Adds an exempt URL pattern.
    pub fn exempt(mut self, pattern: impl Into<String>) -> Self {
        self.exempt_url_patterns.push(pattern.into());
        self
    }

    /// Enables or disables superuser bypass.
    pub fn superuser_bypass(mut self, on: bool) -> Self {
        self.superuser_bypass = on;
        self
    }

    /// Enables or disables audit emission.
    pub fn audit_enabled(mut self, on: bool) -> Self {
        self.audit_enabled = on;
        self
    }
}

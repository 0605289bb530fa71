use crate::codename::Codename;
use crate::types::{PrincipalId, TenantId};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Audit sink error type.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Kind of audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    /// Outcome of tenant resolution for a request.
    TenantResolution,
    /// Outcome of a permission check.
    PermissionCheck,
}

impl AuditKind {
    /// Returns the stable event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TenantResolution => "tenant_resolution",
            Self::PermissionCheck => "permission_check",
        }
    }
}

/// Structured audit event emitted on resolution and authorization outcomes.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub kind: AuditKind,
    pub principal: Option<PrincipalId>,
    pub tenant: Option<TenantId>,
    pub permission: Option<Codename>,
    pub outcome: bool,
    /// Short outcome qualifier, e.g. `bound`, `exempt`, `superuser_bypass`.
    pub detail: &'static str,
    /// Resolution strategy name, set for tenant resolution events.
    pub strategy: Option<&'static str>,
    pub at: SystemTime,
}

impl AuditEvent {
    /// Builds a tenant resolution event.
    pub fn resolution(
        tenant: Option<TenantId>,
        outcome: bool,
        detail: &'static str,
        strategy: &'static str,
    ) -> Self {
        Self {
            kind: AuditKind::TenantResolution,
            principal: None,
            tenant,
            permission: None,
            outcome,
            detail,
            strategy: Some(strategy),
            at: SystemTime::now(),
        }
    }

    /// Builds a permission check event.
    pub fn permission_check(
        principal: PrincipalId,
        tenant: TenantId,
        permission: Codename,
        outcome: bool,
        detail: &'static str,
    ) -> Self {
        Self {
            kind: AuditKind::PermissionCheck,
            principal: Some(principal),
            tenant: Some(tenant),
            permission: Some(permission),
            outcome,
            detail,
            strategy: None,
            at: SystemTime::now(),
        }
    }

    /// Event timestamp as milliseconds since the unix epoch.
    pub fn unix_ms(&self) -> u128 {
        self.at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }
}

/// Destination for audit events.
///
/// Emission must be cheap and non-blocking; slow transports belong behind a
/// channel owned by the implementation.
pub trait AuditSink: Send + Sync {
    /// Emits one event.
    fn emit(&self, event: &AuditEvent) -> std::result::Result<(), SinkError>;
}

/// Default sink that writes structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl AuditSink for LogSink {
    fn emit(&self, event: &AuditEvent) -> std::result::Result<(), SinkError> {
        let principal = event.principal.as_ref().map(|p| p.as_str());
        let tenant = event.tenant.as_ref().map(|t| t.as_str());
        let permission = event.permission.as_ref().map(|c| c.as_str());
        if event.outcome {
            tracing::info!(
                target: "tenant_authx::audit",
                event = event.kind.as_str(),
                principal,
                tenant,
                permission,
                outcome = event.outcome,
                detail = event.detail,
                strategy = event.strategy,
                at_unix_ms = event.unix_ms() as u64,
            );
        } else {
            tracing::warn!(
                target: "tenant_authx::audit",
                event = event.kind.as_str(),
                principal,
                tenant,
                permission,
                outcome = event.outcome,
                detail = event.detail,
                strategy = event.strategy,
                at_unix_ms = event.unix_ms() as u64,
            );
        }
        Ok(())
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AuditSink for NullSink {
    fn emit(&self, _event: &AuditEvent) -> std::result::Result<(), SinkError> {
        Ok(())
    }
}

/// Fire-and-forget audit emitter.
///
/// A sink failure is downgraded to a local warning and swallowed; it never
/// blocks or alters the decision being audited.
#[derive(Clone)]
pub struct Auditor {
    sink: Arc<dyn AuditSink>,
    enabled: bool,
}

impl Auditor {
    /// Creates an enabled auditor over the given sink.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            enabled: true,
        }
    }

    /// Creates a disabled auditor.
    pub fn disabled() -> Self {
        Self {
            sink: Arc::new(NullSink),
            enabled: false,
        }
    }

    /// Enables or disables emission.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Emits an event, best effort.
    pub fn emit(&self, event: AuditEvent) {
        if !self.enabled {
            return;
        }
        if let Err(err) = self.sink.emit(&event) {
            tracing::warn!(
                target: "tenant_authx::audit",
                error = %err,
                event = event.kind.as_str(),
                "audit sink failed; decision unaffected"
            );
        }
    }
}

impl Default for Auditor {
    fn default() -> Self {
        Self::new(Arc::new(LogSink))
    }
}

impl std::fmt::Debug for Auditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auditor")
            .field("enabled", &self.enabled)
            .finish()
    }
}

//! Multi-tenant request resolution and tenant-scoped RBAC authorization.
//!
//! This crate answers two questions for a multi-tenant application: *which
//! tenant does this request belong to* and *what may this principal do
//! inside that tenant*. Tenant resolution supports domain, subdomain, path,
//! and header strategies with exemption rules; authorization walks the
//! membership, role, and permission graph and is deny-by-default. Use
//! [`ResolutionEngine`] to bind requests to tenants, [`Engine`] for
//! permission evaluation, and [`TenantUser`] as the per-request facade.
//!
//! # Examples
//!
//! Basic authorization flow using the in-memory store (enable
//! `memory-store`):
//! ```no_run
//! use tenant_authx::{Codename, EngineBuilder, Principal, PrincipalId, Tenant, TenantId};
//! # #[cfg(feature = "memory-store")]
//! # {
//! use std::sync::Arc;
//! use tenant_authx::{MemoryStore, TenantUser};
//! let store = MemoryStore::new();
//! let engine = Arc::new(EngineBuilder::new(store).build());
//! let tenant = Tenant::new(TenantId::try_from("t1").unwrap(), "Acme", "acme");
//! let principal = Principal::new(PrincipalId::try_from("user_1").unwrap());
//! let user = TenantUser::new(engine, principal, tenant);
//! let codename = Codename::try_from("invoices.view_invoice").unwrap();
//! let _ = user.has_perm(&codename);
//! # }
//! ```
//!
//! Resolving a tenant from request metadata:
//! ```no_run
//! # #[cfg(feature = "memory-store")]
//! # {
//! use tenant_authx::{Auditor, Config, MemoryStore, RequestMeta, ResolutionEngine, Strategy};
//! let store = MemoryStore::new();
//! let config = Config::for_strategy(Strategy::Subdomain).base_domain("example.com");
//! let engine = ResolutionEngine::new(store, &config, Auditor::disabled()).unwrap();
//! let meta = RequestMeta::new("/dashboard/").with_host("acme.example.com");
//! let _ = engine.resolve(&meta);
//! # }
//! ```
#![forbid(unsafe_code)]

mod audit;
mod cache;
mod codename;
mod config;
mod engine;
mod error;
mod facade;
mod model;
mod request;
mod resolution;
mod resolver;
mod store;
mod types;

#[cfg(feature = "memory-cache")]
mod memory_cache;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::audit::{AuditEvent, AuditKind, AuditSink, Auditor, LogSink, NullSink, SinkError};
pub use crate::cache::{NoCache, PermissionCache};
pub use crate::codename::Codename;
pub use crate::config::{Config, Strategy};
pub use crate::engine::{Engine, EngineBuilder};
pub use crate::error::{Error, Result, StoreError};
pub use crate::facade::TenantUser;
pub use crate::model::{Membership, PermissionRecord, Principal, Role, Tenant, TenantOwned};
pub use crate::request::RequestMeta;
pub use crate::resolution::{Resolution, ResolutionEngine};
pub use crate::store::{EntityStore, MembershipStore, TenantDirectory};
pub use crate::types::{MembershipId, PermissionId, PrincipalId, RoleId, TenantId};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;

#[cfg(feature = "memory-cache")]
pub use crate::memory_cache::MemoryCache;

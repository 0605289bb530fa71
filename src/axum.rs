//! Axum integration utilities.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::codename::Codename;
use crate::engine::Engine;
use crate::model::{Principal, Tenant};
use crate::request::RequestMeta;
use crate::resolution::{Resolution, ResolutionEngine};
use crate::types::RoleId;

use ::axum::body::Body;
use ::axum::http::header::HOST;
use ::axum::http::{Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::tower::{Layer, Service};

/// Tenant bound to the current request, inserted into request extensions by
/// [`ResolveTenantLayer`].
#[derive(Debug, Clone)]
pub struct CurrentTenant(pub Tenant);

/// Middleware layer that resolves the request's tenant via
/// [`ResolutionEngine`] and attaches it as a [`CurrentTenant`] extension.
///
/// Exempt requests pass through without a tenant. Unresolved requests are
/// answered with `404` so tenant existence is not distinguishable from any
/// other missing resource; a store outage is answered with `503`.
#[derive(Debug, Clone)]
pub struct ResolveTenantLayer<S> {
    engine: Arc<ResolutionEngine<S>>,
}

impl<S> ResolveTenantLayer<S> {
    /// Creates a new tenant resolution layer.
    pub fn new(engine: Arc<ResolutionEngine<S>>) -> Self {
        Self { engine }
    }
}

impl<S, Inner> Layer<Inner> for ResolveTenantLayer<S>
where
    S: crate::store::TenantDirectory + Send + Sync,
{
    type Service = ResolveTenantService<Inner, S>;

    fn layer(&self, inner: Inner) -> Self::Service {
        ResolveTenantService {
            inner,
            engine: self.engine.clone(),
        }
    }
}

/// Middleware service produced by [`ResolveTenantLayer`].
#[derive(Debug, Clone)]
pub struct ResolveTenantService<Inner, S> {
    inner: Inner,
    engine: Arc<ResolutionEngine<S>>,
}

impl<Inner, S> Service<Request<Body>> for ResolveTenantService<Inner, S>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    S: crate::store::TenantDirectory + Send + Sync + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let engine = self.engine.clone();
        let meta = request_meta(&req);

        Box::pin(async move {
            match engine.resolve(&meta).await {
                Ok(Resolution::Bound(tenant)) => {
                    req.extensions_mut().insert(CurrentTenant(tenant));
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Ok(Resolution::Exempt) => {
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Ok(Resolution::Unresolved) => {
                    Ok((StatusCode::NOT_FOUND, "not found").into_response())
                }
                Err(_) => Ok((
                    StatusCode::SERVICE_UNAVAILABLE,
                    "tenant resolution unavailable",
                )
                    .into_response()),
            }
        })
    }
}

/// Middleware layer that enforces a permission using [`Engine`].
///
/// Requires an upstream authentication layer to have inserted a
/// [`Principal`] extension, and [`ResolveTenantLayer`] to have bound the
/// tenant. A store outage fails closed with `503` rather than granting
/// access.
#[derive(Debug, Clone)]
pub struct RequirePermissionLayer<S, C> {
    engine: Arc<Engine<S, C>>,
    codename: Codename,
}

impl<S, C> RequirePermissionLayer<S, C> {
    /// Creates a new permission enforcement layer.
    pub fn new(engine: Arc<Engine<S, C>>, codename: Codename) -> Self {
        Self { engine, codename }
    }
}

impl<S, C, Inner> Layer<Inner> for RequirePermissionLayer<S, C>
where
    S: crate::store::EntityStore,
    C: crate::cache::PermissionCache,
{
    type Service = RequirePermissionService<Inner, S, C>;

    fn layer(&self, inner: Inner) -> Self::Service {
        RequirePermissionService {
            inner,
            engine: self.engine.clone(),
            codename: self.codename.clone(),
        }
    }
}

/// Middleware service produced by [`RequirePermissionLayer`].
#[derive(Debug, Clone)]
pub struct RequirePermissionService<Inner, S, C> {
    inner: Inner,
    engine: Arc<Engine<S, C>>,
    codename: Codename,
}

impl<Inner, S, C> Service<Request<Body>> for RequirePermissionService<Inner, S, C>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    S: crate::store::EntityStore + 'static,
    C: crate::cache::PermissionCache + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let engine = self.engine.clone();
        let codename = self.codename.clone();

        Box::pin(async move {
            let Some(CurrentTenant(tenant)) = req.extensions().get::<CurrentTenant>().cloned()
            else {
                return Ok((StatusCode::NOT_FOUND, "not found").into_response());
            };
            let Some(principal) = req.extensions().get::<Principal>().cloned() else {
                return Ok((StatusCode::UNAUTHORIZED, "authentication required").into_response());
            };

            match engine.has_perm(&principal, &tenant, &codename).await {
                Ok(true) => {
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Ok(false) => Ok((StatusCode::FORBIDDEN, "forbidden").into_response()),
                Err(_) => Ok((
                    StatusCode::SERVICE_UNAVAILABLE,
                    "authorization unavailable",
                )
                    .into_response()),
            }
        })
    }
}

/// Middleware layer that requires the principal to hold a role in the
/// bound tenant.
///
/// Same extension contract and status mapping as
/// [`RequirePermissionLayer`], with the check delegated to
/// [`Engine::has_role`].
#[derive(Debug, Clone)]
pub struct RequireRoleLayer<S, C> {
    engine: Arc<Engine<S, C>>,
    role: RoleId,
}

impl<S, C> RequireRoleLayer<S, C> {
    /// Creates a new role enforcement layer.
    pub fn new(engine: Arc<Engine<S, C>>, role: RoleId) -> Self {
        Self { engine, role }
    }
}

impl<S, C, Inner> Layer<Inner> for RequireRoleLayer<S, C>
where
    S: crate::store::EntityStore,
    C: crate::cache::PermissionCache,
{
    type Service = RequireRoleService<Inner, S, C>;

    fn layer(&self, inner: Inner) -> Self::Service {
        RequireRoleService {
            inner,
            engine: self.engine.clone(),
            role: self.role.clone(),
        }
    }
}

/// Middleware service produced by [`RequireRoleLayer`].
#[derive(Debug, Clone)]
pub struct RequireRoleService<Inner, S, C> {
    inner: Inner,
    engine: Arc<Engine<S, C>>,
    role: RoleId,
}

impl<Inner, S, C> Service<Request<Body>> for RequireRoleService<Inner, S, C>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    S: crate::store::EntityStore + 'static,
    C: crate::cache::PermissionCache + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let engine = self.engine.clone();
        let role = self.role.clone();

        Box::pin(async move {
            let Some(CurrentTenant(tenant)) = req.extensions().get::<CurrentTenant>().cloned()
            else {
                return Ok((StatusCode::NOT_FOUND, "not found").into_response());
            };
            let Some(principal) = req.extensions().get::<Principal>().cloned() else {
                return Ok((StatusCode::UNAUTHORIZED, "authentication required").into_response());
            };

            match engine.has_role(&principal, &tenant, &role).await {
                Ok(true) => {
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Ok(false) => Ok((StatusCode::FORBIDDEN, "forbidden").into_response()),
                Err(_) => Ok((
                    StatusCode::SERVICE_UNAVAILABLE,
                    "authorization unavailable",
                )
                    .into_response()),
            }
        })
    }
}

/// Builds a [`RequestMeta`] from an http request.
///
/// The host is taken from the `Host` header; headers with non-UTF-8 values
/// are skipped since resolution only consults textual headers.
fn request_meta(req: &Request<Body>) -> RequestMeta {
    let mut meta = RequestMeta::new(req.uri().path());
    if let Some(host) = req.headers().get(HOST).and_then(|v| v.to_str().ok()) {
        meta = meta.with_host(host);
    }
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            meta = meta.with_header(name.as_str(), value);
        }
    }
    meta
}

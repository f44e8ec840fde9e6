//! Ordered request pipeline: each filter wraps the next stage as a plain
//! callable, the way the original chain built its `RequestHandler` /
//! `SetNext` graph — not stacked `actix_web::Transform`s, which require a
//! static per-middleware type and can't represent a runtime-configured,
//! heterogeneous, per-route filter list (see `router.rs`).
use std::sync::Arc;

use actix_web::body::BoxBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::{Error as ActixError, HttpMessage as _};
use futures::future::LocalBoxFuture;

use crate::cache::{Session, UserIdentity};

pub mod csrf;
pub mod identity;
pub mod log;
pub mod session;
pub mod user_auth;

/// The remainder of the pipeline, from a given filter's point of view.
pub type NextFn = Arc<
    dyn Fn(ServiceRequest) -> LocalBoxFuture<'static, Result<ServiceResponse<BoxBody>, ActixError>>
        + Send
        + Sync,
>;

/// One pipeline stage: given the request and the rest of the chain,
/// produce the final response.
pub type FilterFn = Arc<
    dyn Fn(ServiceRequest, NextFn) -> LocalBoxFuture<'static, Result<ServiceResponse<BoxBody>, ActixError>>
        + Send
        + Sync,
>;

pub(crate) fn session_of(req: &ServiceRequest) -> Option<Arc<Session>> {
    req.extensions().get::<Arc<Session>>().cloned()
}

pub(crate) fn attach_session(req: &ServiceRequest, session: Arc<Session>) {
    req.extensions_mut().insert(session);
}

pub(crate) fn identity_of(req: &ServiceRequest) -> Option<Arc<UserIdentity>> {
    req.extensions().get::<Arc<UserIdentity>>().cloned()
}

pub(crate) fn attach_identity(req: &ServiceRequest, identity: Arc<UserIdentity>) {
    req.extensions_mut().insert(identity);
}

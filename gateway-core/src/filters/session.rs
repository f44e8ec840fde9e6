//! Session filter (spec.md §4.2): resolves the caller's session from its
//! cookie or mints a new one, rotating the cookie inside a renewal
//! window while the session id stays stable, grounded in
//! `examples/original_source/filters/sessionFilterHandler.go`.
use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceRequest;
use actix_web::http::header;
use chrono::{Duration as ChronoDuration, Utc};
use tracing::{trace, warn};

use crate::cache::{Session, SessionCache};
use crate::memorydb::MemoryDB;

use super::{attach_session, FilterFn, NextFn};

#[derive(Debug, Clone)]
pub struct SessionFilterConfig {
    pub name: String,
    pub cookie_name: String,
    pub cookie_path: String,
    pub cookie_domain: Option<String>,
    pub ttl_hours: u32,
    pub renew_before_hours: u32,
}

pub fn handler<M: MemoryDB + 'static>(config: SessionFilterConfig, cache: SessionCache<M>) -> FilterFn {
    Arc::new(move |req: ServiceRequest, next: NextFn| {
        let config = config.clone();
        let cache = cache.clone();
        Box::pin(async move {
            let span = tracing::info_span!("filter", filter_name = %config.name);
            let _enter = span.enter();

            let existing_cookie = req.cookie(&config.cookie_name).map(|c| c.value().to_string());
            let (session, minted) = resolve_or_create(&config, &cache, existing_cookie.as_deref()).await;

            attach_session(&req, Arc::new(session.clone()));
            drop(_enter);

            let res = next(req).await?;
            if !minted {
                return Ok(res);
            }

            let mut res = res;
            let mut cookie = Cookie::new(config.cookie_name.clone(), session.cookie.clone());
            cookie.set_path(config.cookie_path.clone());
            if let Some(domain) = &config.cookie_domain {
                cookie.set_domain(domain.clone());
            }
            cookie.set_expires(
                actix_web::cookie::time::OffsetDateTime::from_unix_timestamp(session.expires.timestamp())
                    .unwrap_or(actix_web::cookie::time::OffsetDateTime::UNIX_EPOCH),
            );
            if let Ok(value) = header::HeaderValue::from_str(&cookie.to_string()) {
                res.response_mut().headers_mut().append(header::SET_COOKIE, value);
            }
            Ok(res)
        })
    })
}

/// Returns the resolved session and whether it was newly minted (and so
/// needs a `Set-Cookie` on the response).
async fn resolve_or_create<M: MemoryDB>(
    config: &SessionFilterConfig,
    cache: &SessionCache<M>,
    existing_cookie: Option<&str>,
) -> (Session, bool) {
    if let Some(cookie) = existing_cookie {
        trace!(cookie, "found session cookie");
        match cache.get(cookie).await {
            Ok(Some(session)) => {
                let renew_at = session.expires - ChronoDuration::hours(i64::from(config.renew_before_hours));
                if Utc::now() < renew_at {
                    trace!(session_id = %session.id, "session still valid");
                    return (session, false);
                }
                trace!(session_id = %session.id, "session in renewal window, rotating cookie");
                let rotated = create(config, cache, Some(session.id.clone())).await;
                let _ = cache.remove(&session).await;
                return (rotated, true);
            }
            Ok(None) => {
                warn!("session cookie not found in cache, creating new session");
            }
            Err(e) => {
                warn!(error = %e, "session lookup failed, creating new session");
            }
        }
    } else {
        trace!("no session cookie in request, creating new session");
    }
    (create(config, cache, None).await, true)
}

async fn create<M: MemoryDB>(
    config: &SessionFilterConfig,
    cache: &SessionCache<M>,
    existing_id: Option<String>,
) -> Session {
    let id = existing_id.unwrap_or_else(SessionCache::<M>::new_id);
    let session = Session {
        id,
        cookie: SessionCache::<M>::new_cookie(),
        expires: Utc::now() + ChronoDuration::hours(i64::from(config.ttl_hours)),
    };
    if let Err(e) = cache.put(&session).await {
        warn!(error = %e, "storing new session failed");
    }
    session
}

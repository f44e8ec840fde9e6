//! User-authentication filter (spec.md §4.3): looks up the identity
//! bound to the current session and attaches it to the request,
//! grounded in
//! `examples/original_source/pkg/auth/userAuthenticationFilter.go`.
use std::sync::Arc;

use actix_web::dev::ServiceRequest;
use actix_web::http::header;
use actix_web::HttpResponse;
use tracing::debug;

use crate::cache::IdentityCache;
use crate::memorydb::MemoryDB;

use super::{attach_identity, session_of, FilterFn, NextFn};

#[derive(Debug, Clone)]
pub struct UserAuthFilterConfig {
    pub name: String,
    /// Missing session or identity fails the request (401) instead of
    /// logging and proceeding.
    pub required: bool,
    /// When `required` and set, a failure redirects here (302) instead
    /// of returning 401.
    pub redirect_page: Option<String>,
}

pub fn handler<M: MemoryDB + 'static>(config: UserAuthFilterConfig, cache: IdentityCache<M>) -> FilterFn {
    Arc::new(move |req: ServiceRequest, next: NextFn| {
        let config = config.clone();
        let cache = cache.clone();
        Box::pin(async move {
            let span = tracing::info_span!("filter", filter_name = %config.name);
            let _enter = span.enter();

            let session = session_of(&req);
            let resolved = match &session {
                Some(session) => match cache.get(&session.id).await {
                    Ok(Some(identity)) => {
                        debug!(identifier = %identity.identifier, "user data found, attaching to request");
                        Some(identity)
                    }
                    Ok(None) => {
                        debug!("user data not found in the cache");
                        None
                    }
                    Err(e) => {
                        debug!(error = %e, "user data lookup failed");
                        None
                    }
                },
                None => {
                    debug!("session not found in the request");
                    None
                }
            };

            match resolved {
                Some(identity) => attach_identity(&req, Arc::new(identity)),
                None if config.required => {
                    drop(_enter);
                    if let Some(page) = &config.redirect_page {
                        let (http_req, _) = req.into_parts();
                        return Ok(actix_web::dev::ServiceResponse::new(
                            http_req,
                            HttpResponse::Found()
                                .insert_header((header::LOCATION, page.clone()))
                                .finish(),
                        ));
                    }
                    let (http_req, _) = req.into_parts();
                    return Ok(actix_web::dev::ServiceResponse::new(
                        http_req,
                        HttpResponse::Unauthorized().finish(),
                    ));
                }
                None => {}
            }
            drop(_enter);
            next(req).await
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Session, UserIdentity};
    use crate::filters::attach_session;
    use crate::memorydb::default::DefaultBackend;
    use actix_web::test::TestRequest;
    use chrono::Utc;

    fn ok_next() -> NextFn {
        Arc::new(|req: ServiceRequest| {
            Box::pin(async move {
                Ok(req.into_response(HttpResponse::Ok().finish()))
            })
        })
    }

    fn session() -> Session {
        Session {
            id: "sess-1".into(),
            cookie: "cookie-1".into(),
            expires: Utc::now() + chrono::Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn permissive_continues_past_a_missing_identity() {
        let cache = IdentityCache::new(DefaultBackend::new(None), 24);
        let filter = handler(
            UserAuthFilterConfig {
                name: "auth".into(),
                required: false,
                redirect_page: None,
            },
            cache,
        );

        let req = TestRequest::default().to_srv_request();
        attach_session(&req, Arc::new(session()));
        let res = filter(req, ok_next()).await.unwrap();
        assert!(res.status().is_success());
    }

    #[tokio::test]
    async fn required_rejects_a_missing_identity_with_401() {
        let cache = IdentityCache::new(DefaultBackend::new(None), 24);
        let filter = handler(
            UserAuthFilterConfig {
                name: "auth".into(),
                required: true,
                redirect_page: None,
            },
            cache,
        );

        let req = TestRequest::default().to_srv_request();
        attach_session(&req, Arc::new(session()));
        let res = filter(req, ok_next()).await.unwrap();
        assert_eq!(res.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn required_redirects_when_a_redirect_page_is_set() {
        let cache = IdentityCache::new(DefaultBackend::new(None), 24);
        let filter = handler(
            UserAuthFilterConfig {
                name: "auth".into(),
                required: true,
                redirect_page: Some("/login".into()),
            },
            cache,
        );

        let req = TestRequest::default().to_srv_request();
        let res = filter(req, ok_next()).await.unwrap();
        assert_eq!(res.status(), actix_web::http::StatusCode::FOUND);
        assert_eq!(res.headers().get(header::LOCATION).unwrap(), "/login");
    }

    #[tokio::test]
    async fn a_bound_identity_is_attached_and_the_chain_continues() {
        let cache = IdentityCache::new(DefaultBackend::new(None), 24);
        let identity = UserIdentity {
            identifier: "u1".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            picture: "".into(),
            locale: "en".into(),
        };
        let session = session();
        cache.put(&session.id, &identity).await.unwrap();

        let filter = handler(
            UserAuthFilterConfig {
                name: "auth".into(),
                required: true,
                redirect_page: None,
            },
            cache,
        );

        let req = TestRequest::default().to_srv_request();
        attach_session(&req, Arc::new(session));
        let res = filter(req, ok_next()).await.unwrap();
        assert!(res.status().is_success());
    }
}

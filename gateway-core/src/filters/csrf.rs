//! CSRF filter (spec.md §4.4): mints a token header on safe methods,
//! checks it on unsafe ones. Failure bodies are literal strings matching
//! `examples/original_source/pkg/filters/CsrfFilter.go` exactly.
use std::collections::HashSet;
use std::sync::Arc;

use actix_web::body::BoxBody;
use actix_web::dev::ServiceRequest;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::HttpResponse;
use tracing::error;

use crate::encryptor::Encryptor;

use super::{session_of, FilterFn, NextFn};

#[derive(Debug, Clone)]
pub struct CsrfFilterConfig {
    pub name: String,
    pub header_name: String,
    pub safe_methods: HashSet<String>,
}

pub fn handler(config: CsrfFilterConfig, encryptor: Encryptor) -> FilterFn {
    Arc::new(move |req: ServiceRequest, next: NextFn| {
        let config = config.clone();
        let encryptor = encryptor.clone();
        Box::pin(async move {
            let span = tracing::info_span!("filter", filter_name = %config.name);
            let _enter = span.enter();

            let session = match session_of(&req) {
                Some(session) => session,
                None => {
                    let message = "Csrf filter error. Reason: session not found. Session filter required to be performed before CSRF filter";
                    error!("{message}");
                    let (http_req, _) = req.into_parts();
                    return Ok(plain_text(http_req, 500, message.to_string()));
                }
            };

            if config.safe_methods.contains(req.method().as_str()) {
                let token = match encryptor.encrypt(&session.id) {
                    Ok(token) => token,
                    Err(e) => {
                        let message = format!("Csrf filter error. Reason: {e}");
                        error!("{message}");
                        let (http_req, _) = req.into_parts();
                        return Ok(plain_text(http_req, 500, message));
                    }
                };
                let header = HeaderName::try_from(config.header_name.as_str()).ok();
                let value = HeaderValue::try_from(token).ok();
                drop(_enter);
                let mut res = next(req).await?;
                if let (Some(header), Some(value)) = (header, value) {
                    res.response_mut().headers_mut().append(header, value);
                }
                return Ok(res);
            }

            let provided = match req.headers().get(&config.header_name) {
                Some(value) => value.to_str().unwrap_or("").to_string(),
                None => String::new(),
            };
            if provided.is_empty() {
                let message =
                    format!("resolving CSRF header error. CSRF header: {} is empty", config.header_name);
                let (http_req, _) = req.into_parts();
                return Ok(plain_text(http_req, 403, message));
            }

            match encryptor.decrypt(&provided) {
                Ok(plaintext) if plaintext == session.id => {}
                Ok(_) => {
                    let (http_req, _) = req.into_parts();
                    return Ok(plain_text(http_req, 403, "invalid CSRF token".to_string()));
                }
                Err(e) => {
                    let message = format!("decrypt CSRF header error. Reason: {e}");
                    let (http_req, _) = req.into_parts();
                    return Ok(plain_text(http_req, 403, message));
                }
            }

            drop(_enter);
            next(req).await
        })
    })
}

fn plain_text(
    req: actix_web::HttpRequest,
    status: u16,
    body: String,
) -> actix_web::dev::ServiceResponse<BoxBody> {
    let response = HttpResponse::build(actix_web::http::StatusCode::from_u16(status).unwrap()).body(body);
    actix_web::dev::ServiceResponse::new(req, response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Session;
    use crate::filters::attach_session;
    use actix_web::test::TestRequest;

    fn ok_next() -> NextFn {
        Arc::new(|req: ServiceRequest| {
            Box::pin(async move { Ok(req.into_response(HttpResponse::Ok().finish())) })
        })
    }

    fn config() -> CsrfFilterConfig {
        CsrfFilterConfig {
            name: "csrf".into(),
            header_name: "X-CSRF-Token".into(),
            safe_methods: HashSet::from(["GET".to_string()]),
        }
    }

    fn session() -> Session {
        Session {
            id: "sess-1".into(),
            cookie: "cookie-1".into(),
            expires: chrono::Utc::now() + chrono::Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn a_safe_method_mints_a_token_header() {
        let filter = handler(config(), Encryptor::new("secret"));
        let req = TestRequest::get().to_srv_request();
        attach_session(&req, Arc::new(session()));

        let res = filter(req, ok_next()).await.unwrap();
        assert!(res.status().is_success());
        assert!(res.headers().contains_key("x-csrf-token"));
    }

    #[tokio::test]
    async fn an_unsafe_method_without_a_header_is_rejected() {
        let filter = handler(config(), Encryptor::new("secret"));
        let req = TestRequest::post().to_srv_request();
        attach_session(&req, Arc::new(session()));

        let res = filter(req, ok_next()).await.unwrap();
        assert_eq!(res.status(), actix_web::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn a_round_tripped_token_is_accepted_on_an_unsafe_method() {
        let encryptor = Encryptor::new("secret");
        let token = encryptor.encrypt(&session().id).unwrap();
        let filter = handler(config(), encryptor);

        let req = TestRequest::post()
            .insert_header(("X-CSRF-Token", token))
            .to_srv_request();
        attach_session(&req, Arc::new(session()));

        let res = filter(req, ok_next()).await.unwrap();
        assert!(res.status().is_success());
    }

    #[tokio::test]
    async fn a_token_for_a_different_session_is_rejected() {
        let encryptor = Encryptor::new("secret");
        let token = encryptor.encrypt("someone-else").unwrap();
        let filter = handler(config(), encryptor);

        let req = TestRequest::post()
            .insert_header(("X-CSRF-Token", token))
            .to_srv_request();
        attach_session(&req, Arc::new(session()));

        let res = filter(req, ok_next()).await.unwrap();
        assert_eq!(res.status(), actix_web::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn a_missing_session_fails_closed_with_500() {
        let filter = handler(config(), Encryptor::new("secret"));
        let req = TestRequest::get().to_srv_request();

        let res = filter(req, ok_next()).await.unwrap();
        assert_eq!(res.status(), actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}

//! Identity-injection filter (spec.md §4.6, `UserDataSenderFilter` in
//! config): serializes the identity attached by the user-authentication
//! filter into a header for the upstream to read.
use std::sync::Arc;

use actix_web::dev::ServiceRequest;
use actix_web::http::header::{HeaderName, HeaderValue};
use tracing::warn;

use crate::identity::IdentitySerializer;

use super::{identity_of, FilterFn, NextFn};

#[derive(Debug, Clone)]
pub struct IdentityFilterConfig {
    pub name: String,
    pub header_name: String,
}

pub fn handler(config: IdentityFilterConfig, serializer: IdentitySerializer) -> FilterFn {
    Arc::new(move |mut req: ServiceRequest, next: NextFn| {
        let config = config.clone();
        let serializer = serializer.clone();
        Box::pin(async move {
            let span = tracing::info_span!("filter", filter_name = %config.name);
            let _enter = span.enter();

            match identity_of(&req) {
                Some(identity) => match serializer.serialize(&identity) {
                    Ok(token) => {
                        if let (Ok(name), Ok(value)) = (
                            HeaderName::try_from(config.header_name.as_str()),
                            HeaderValue::try_from(token),
                        ) {
                            req.headers_mut().insert(name, value);
                        }
                    }
                    Err(e) => warn!(error = %e, "serializing identity failed"),
                },
                None => warn!("no user data attached to the request, forwarding unchanged"),
            }

            drop(_enter);
            next(req).await
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::UserIdentity;
    use crate::filters::attach_identity;
    use actix_web::test::TestRequest;
    use actix_web::HttpResponse;

    fn ok_next() -> NextFn {
        Arc::new(|req: ServiceRequest| {
            Box::pin(async move { Ok(req.into_response(HttpResponse::Ok().finish())) })
        })
    }

    #[tokio::test]
    async fn an_attached_identity_is_serialized_into_the_configured_header() {
        let serializer = IdentitySerializer::new("sign-secret".into());
        let filter = handler(
            IdentityFilterConfig {
                name: "identity".into(),
                header_name: "X-User-Data".into(),
            },
            serializer,
        );

        let captured = Arc::new(std::sync::Mutex::new(None));
        let capture_for_next = captured.clone();
        let echo_header: NextFn = Arc::new(move |req: ServiceRequest| {
            let captured = capture_for_next.clone();
            Box::pin(async move {
                *captured.lock().unwrap() = req
                    .headers()
                    .get("x-user-data")
                    .map(|v| v.to_str().unwrap_or_default().to_string());
                Ok(req.into_response(HttpResponse::Ok().finish()))
            })
        });

        let req = TestRequest::default().to_srv_request();
        attach_identity(
            &req,
            Arc::new(UserIdentity {
                identifier: "u1".into(),
                username: "alice".into(),
                email: "alice@example.com".into(),
                picture: "".into(),
                locale: "en".into(),
            }),
        );
        filter(req, echo_header).await.unwrap();

        assert!(captured.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn without_an_attached_identity_the_chain_still_continues() {
        let filter = handler(
            IdentityFilterConfig {
                name: "identity".into(),
                header_name: "X-User-Data".into(),
            },
            IdentitySerializer::new("sign-secret".into()),
        );

        let req = TestRequest::default().to_srv_request();
        let res = filter(req, ok_next()).await.unwrap();
        assert!(res.status().is_success());
    }
}

//! OAuth2 authorization-code exchange endpoint (spec.md §4.7): terminal
//! handler for the provider redirect, grounded in
//! `examples/original_source/pkg/auth/googleProvider.go` generalized
//! from Google specifically to any provider exposing the same token /
//! userinfo contract (both endpoints are already per-route configuration).
use std::sync::Arc;

use actix_web::body::BoxBody;
use actix_web::dev::ServiceRequest;
use actix_web::HttpResponse;
use reqwest::Client;
use serde::Deserialize;
use tracing::error;

use crate::cache::{self, IdentityCache, UserIdentity};
use crate::filters::{session_of, NextFn};
use crate::memorydb::MemoryDB;

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub success_login_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub access_token_request_url: String,
    pub user_info_request_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    sub: String,
    name: String,
    #[serde(default)]
    picture: String,
    email: String,
    #[serde(default)]
    locale: String,
}

#[derive(Clone)]
pub struct OAuthEndpoint<M: MemoryDB> {
    config: OAuthConfig,
    identities: IdentityCache<M>,
    client: Client,
}

impl<M: MemoryDB + 'static> OAuthEndpoint<M> {
    pub fn new(config: OAuthConfig, identities: IdentityCache<M>, client: Client) -> Self {
        Self {
            config,
            identities,
            client,
        }
    }

    pub fn into_terminal(self) -> NextFn {
        Arc::new(move |req: ServiceRequest| {
            let this = self.clone();
            Box::pin(async move { this.handle(req).await })
        })
    }

    async fn handle(
        &self,
        req: ServiceRequest,
    ) -> Result<actix_web::dev::ServiceResponse<BoxBody>, actix_web::Error> {
        let session = match session_of(&req) {
            Some(session) => session,
            None => {
                error!("Performing authorisation error. Reason: session not found in the request context.");
                let (http_req, _) = req.into_parts();
                return Ok(plain(http_req, 501));
            }
        };

        if matches!(self.identities.get(&session.id).await, Ok(Some(_))) {
            let (http_req, _) = req.into_parts();
            return Ok(redirect(http_req, &self.config.success_login_url));
        }

        let query = req.query_string();
        let params: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap_or_default();
        let error_param = params.iter().find(|(k, _)| k == "error").map(|(_, v)| v.clone());
        if error_param.is_some_and(|v| !v.is_empty()) {
            let (http_req, _) = req.into_parts();
            return Ok(plain(http_req, 403));
        }
        let code = params.iter().find(|(k, _)| k == "code").map(|(_, v)| v.clone());
        let code = match code {
            Some(code) if !code.is_empty() => code,
            _ => {
                let (http_req, _) = req.into_parts();
                return Ok(plain(http_req, 403));
            }
        };

        let identity = match self.exchange(&code).await {
            Ok(identity) => identity,
            Err(e) => {
                error!(error = %e, "performing authorisation error");
                let (http_req, _) = req.into_parts();
                return Ok(plain(http_req, 403));
            }
        };

        let (http_req, _) = req.into_parts();
        match self.identities.put(&session.id, &identity).await {
            Ok(true) => Ok(redirect(http_req, &self.config.success_login_url)),
            Ok(false) => {
                error!(error = %cache::conflict(), "performing authorisation error");
                Ok(plain(http_req, 500))
            }
            Err(e) => {
                error!(error = %e, "performing authorisation error");
                Ok(plain(http_req, 500))
            }
        }
    }

    async fn exchange(&self, code: &str) -> crate::Result<UserIdentity> {
        let form = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let token_response = self
            .client
            .post(&self.config.access_token_request_url)
            .form(&form)
            .send()
            .await?;
        if !token_response.status().is_success() {
            return Err(crate::Error::Upstream(
                token_response.error_for_status().unwrap_err(),
            ));
        }
        let token: TokenResponse = token_response.json().await?;

        let userinfo_response = self
            .client
            .get(&self.config.user_info_request_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        if !userinfo_response.status().is_success() {
            return Err(crate::Error::Upstream(
                userinfo_response.error_for_status().unwrap_err(),
            ));
        }
        let info: UserInfoResponse = userinfo_response.json().await?;

        Ok(UserIdentity {
            identifier: info.sub,
            username: info.name,
            email: info.email,
            picture: info.picture,
            locale: info.locale,
        })
    }
}

fn plain(req: actix_web::HttpRequest, status: u16) -> actix_web::dev::ServiceResponse<BoxBody> {
    let response =
        HttpResponse::build(actix_web::http::StatusCode::from_u16(status).unwrap()).finish();
    actix_web::dev::ServiceResponse::new(req, response)
}

fn redirect(req: actix_web::HttpRequest, location: &str) -> actix_web::dev::ServiceResponse<BoxBody> {
    let response = HttpResponse::Found()
        .insert_header((actix_web::http::header::LOCATION, location))
        .finish();
    actix_web::dev::ServiceResponse::new(req, response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Session;
    use crate::filters::attach_session;
    use crate::memorydb::default::DefaultBackend;
    use actix_web::test::TestRequest;

    fn endpoint() -> OAuthEndpoint<DefaultBackend> {
        OAuthEndpoint::new(
            OAuthConfig {
                success_login_url: "/welcome".into(),
                client_id: "id".into(),
                client_secret: "secret".into(),
                redirect_uri: "http://localhost:8080/oauth".into(),
                access_token_request_url: "http://unused.invalid/token".into(),
                user_info_request_url: "http://unused.invalid/userinfo".into(),
            },
            IdentityCache::new(DefaultBackend::new(None), 24),
            Client::new(),
        )
    }

    fn session() -> Session {
        Session {
            id: "sess-1".into(),
            cookie: "cookie-1".into(),
            expires: chrono::Utc::now() + chrono::Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn a_missing_session_fails_closed_with_501() {
        let req = TestRequest::default().to_srv_request();
        let res = endpoint().handle(req).await.unwrap();
        assert_eq!(res.status().as_u16(), 501);
    }

    #[tokio::test]
    async fn a_provider_error_param_is_rejected_with_403() {
        let endpoint = endpoint();
        let req = TestRequest::get().uri("/oauth?error=access_denied").to_srv_request();
        attach_session(&req, Arc::new(session()));
        let res = endpoint.handle(req).await.unwrap();
        assert_eq!(res.status(), actix_web::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn a_missing_code_is_rejected_with_403() {
        let endpoint = endpoint();
        let req = TestRequest::get().uri("/oauth").to_srv_request();
        attach_session(&req, Arc::new(session()));
        let res = endpoint.handle(req).await.unwrap();
        assert_eq!(res.status(), actix_web::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn an_already_bound_identity_skips_straight_to_success() {
        let endpoint = endpoint();
        let session = session();
        endpoint
            .identities
            .put(
                &session.id,
                &UserIdentity {
                    identifier: "u1".into(),
                    username: "alice".into(),
                    email: "alice@example.com".into(),
                    picture: "".into(),
                    locale: "en".into(),
                },
            )
            .await
            .unwrap();

        let req = TestRequest::get().uri("/oauth").to_srv_request();
        attach_session(&req, Arc::new(session));
        let res = endpoint.handle(req).await.unwrap();
        assert_eq!(res.status(), actix_web::http::StatusCode::FOUND);
        assert_eq!(
            res.headers().get(actix_web::http::header::LOCATION).unwrap(),
            "/welcome"
        );
    }
}

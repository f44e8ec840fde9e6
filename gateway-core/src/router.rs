//! Pipeline assembler (spec.md §4.10): builds each configured route's
//! filter chain bottom-up — terminal handler first, then each filter
//! wraps the handler built so far — and registers it at the route's
//! prefix. Longest-prefix matching (spec.md §4.10, §6) is realized by
//! registering scopes in descending prefix-length order, so actix's
//! first-match-wins resolution behaves like `http.ServeMux`.
use std::future::Ready;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::body::BoxBody;
use actix_web::dev::{Service, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::web::{self, Data, ServiceConfig};
use reqwest::Client;
use tracing::warn;
use url::Url;

use crate::config::{FilterConfig, FilterKind, GatewayConfig, RouterConfig, RouterKind};
use crate::encryptor::Encryptor;
use crate::filters::{csrf, identity, log, session, user_auth, FilterFn, NextFn};
use crate::identity::IdentitySerializer;
use crate::memorydb::MemoryDB;
use crate::oauth::{OAuthConfig, OAuthEndpoint};
use crate::proxy::ReverseProxy;
use crate::state::GlobalState;

/// Adapts a fully-assembled chain into something `ServiceConfig` can
/// register: a `ServiceFactory<ServiceRequest>` whose single service
/// just invokes the chain head. It never wraps an inner actix service —
/// the chain's own terminal stage is the end of the line.
#[derive(Clone)]
struct Pipeline {
    root: NextFn,
}

impl ServiceFactory<ServiceRequest> for Pipeline {
    type Response = ServiceResponse<BoxBody>;
    type Error = actix_web::Error;
    type Config = ();
    type Service = Pipeline;
    type InitError = ();
    type Future = Ready<Result<Self::Service, Self::InitError>>;

    fn new_service(&self, _cfg: ()) -> Self::Future {
        std::future::ready(Ok(self.clone()))
    }
}

impl Service<ServiceRequest> for Pipeline {
    type Response = ServiceResponse<BoxBody>;
    type Error = actix_web::Error;
    type Future = futures::future::LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        (self.root)(req)
    }
}

/// Builds a `ServiceConfig` closure that registers every configured
/// router. Intended for `App::configure`, once per worker — the
/// assembly work happens once, here, and every worker shares the same
/// precomputed chains via cheap `Arc` clones.
pub fn build<M: MemoryDB + 'static>(
    config: GatewayConfig,
    state: Data<GlobalState<M>>,
    http_client: Client,
) -> impl Fn(&mut ServiceConfig) + Clone {
    let domain = config.domain.clone();
    let google_secret = config.google_secret.clone();
    let mut routers = config.routers;
    routers.sort_by_key(|r| std::cmp::Reverse(r.pattern.len()));

    let assembled: Vec<(String, NextFn)> = routers
        .iter()
        .filter_map(|router| {
            let root = assemble(router, &state, &http_client, &domain, google_secret.as_ref());
            if root.is_none() {
                warn!(pattern = %router.pattern, "router has no valid terminal handler, skipping");
            }
            root.map(|root| (router.pattern.clone(), root))
        })
        .collect();

    move |cfg: &mut ServiceConfig| {
        for (pattern, root) in assembled.clone() {
            cfg.service(web::scope(&pattern).default_service(Pipeline { root }));
        }
    }
}

fn assemble<M: MemoryDB + 'static>(
    router: &RouterConfig,
    state: &Data<GlobalState<M>>,
    http_client: &Client,
    domain: &str,
    google_secret: Option<&crate::config::GoogleSecret>,
) -> Option<NextFn> {
    let mut chain = terminal(router, state, http_client, domain, google_secret)?;

    for filter in router.filters.iter().rev() {
        match build_filter(filter, state) {
            Some(filter_fn) => {
                let next = chain;
                chain = wrap(filter_fn, next);
            }
            None => {
                warn!(name = %filter.name, "filter failed to construct, skipping");
            }
        }
    }

    Some(chain)
}

fn wrap(filter: FilterFn, next: NextFn) -> NextFn {
    Arc::new(move |req: ServiceRequest| filter(req, next.clone()))
}

fn terminal<M: MemoryDB + 'static>(
    router: &RouterConfig,
    state: &Data<GlobalState<M>>,
    http_client: &Client,
    domain: &str,
    google_secret: Option<&crate::config::GoogleSecret>,
) -> Option<NextFn> {
    match router.kind {
        RouterKind::ReverseProxy => {
            let target = router.target_url.as_deref()?;
            let target = match Url::parse(target) {
                Ok(target) => target,
                Err(e) => {
                    warn!(error = %e, target, "invalid target-url");
                    return None;
                }
            };
            Some(ReverseProxy::new(target, http_client.clone()).into_terminal())
        }
        RouterKind::GoogleOauth2Authorization => {
            let secret = google_secret?;
            let oauth_config = OAuthConfig {
                success_login_url: router.success_login_url.clone()?,
                client_id: secret.client_id.clone(),
                client_secret: secret.client_secret.clone(),
                redirect_uri: format!("{domain}{}", router.pattern),
                access_token_request_url: router.access_token_request_url.clone()?,
                user_info_request_url: router.user_info_request_url.clone()?,
            };
            Some(OAuthEndpoint::new(oauth_config, state.identities.clone(), http_client.clone()).into_terminal())
        }
    }
}

fn build_filter<M: MemoryDB + 'static>(filter: &FilterConfig, state: &Data<GlobalState<M>>) -> Option<FilterFn> {
    match filter.kind {
        FilterKind::LogFilter => {
            let template = filter.template.as_deref()?;
            log::handler(filter.name.clone(), template)
        }
        FilterKind::SessionFilter => Some(session::handler(
            session::SessionFilterConfig {
                name: filter.name.clone(),
                cookie_name: filter.cookie_name.clone()?,
                cookie_path: filter.cookie_path.clone().unwrap_or_else(|| "/".into()),
                cookie_domain: filter.cookie_domain.clone(),
                ttl_hours: filter.cookie_ttl_hours?,
                renew_before_hours: filter.cookie_renew_before_hours?,
            },
            state.sessions.clone(),
        )),
        FilterKind::UserAuthenticationFilter => Some(user_auth::handler(
            user_auth::UserAuthFilterConfig {
                name: filter.name.clone(),
                required: filter.required,
                redirect_page: filter.redirect_page.clone(),
            },
            state.identities.clone(),
        )),
        FilterKind::CsrfFilter => {
            let secret = filter.secret.as_deref()?;
            Some(csrf::handler(
                csrf::CsrfFilterConfig {
                    name: filter.name.clone(),
                    header_name: filter.header_name.clone()?,
                    safe_methods: filter.safe_methods.clone(),
                },
                Encryptor::new(secret),
            ))
        }
        FilterKind::UserDataSenderFilter => {
            let serializer_config = filter.user_data_serializer.as_ref()?;
            Some(identity::handler(
                identity::IdentityFilterConfig {
                    name: filter.name.clone(),
                    header_name: filter.user_data_header.clone()?,
                },
                IdentitySerializer::new(serializer_config.secret.clone()),
            ))
        }
    }
}

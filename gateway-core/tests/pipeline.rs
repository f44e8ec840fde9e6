//! Drives a full route (session filter -> CSRF filter -> reverse proxy)
//! against a throwaway upstream, equivalent in spirit to
//! `examples/original_source/integration/integration_test.go`.
use std::collections::HashSet;

use actix_web::test::{call_service, init_service, TestRequest};
use actix_web::{web, App, HttpResponse};
use gateway_core::cache::{IdentityCache, SessionCache};
use gateway_core::config::{FilterConfig, FilterKind, RouterConfig, RouterKind};
use gateway_core::memorydb::default::DefaultBackend;
use gateway_core::router;
use gateway_core::state::{GlobalState, StopHandle};

fn session_filter(name: &str) -> FilterConfig {
    FilterConfig {
        kind: FilterKind::SessionFilter,
        name: name.into(),
        template: None,
        cache_adapter_identifier: Some("main".into()),
        cookie_name: Some("session".into()),
        cookie_domain: None,
        cookie_path: Some("/".into()),
        cookie_ttl_hours: Some(24),
        cookie_renew_before_hours: Some(2),
        required: false,
        redirect_page: None,
        user_data_serializer: None,
        user_data_header: None,
        secret: None,
        header_name: None,
        safe_methods: HashSet::new(),
    }
}

fn csrf_filter(name: &str) -> FilterConfig {
    FilterConfig {
        kind: FilterKind::CsrfFilter,
        name: name.into(),
        template: None,
        cache_adapter_identifier: None,
        cookie_name: None,
        cookie_domain: None,
        cookie_path: None,
        cookie_ttl_hours: None,
        cookie_renew_before_hours: None,
        required: false,
        redirect_page: None,
        user_data_serializer: None,
        user_data_header: None,
        secret: Some("test-csrf-secret".into()),
        header_name: Some("X-CSRF-Token".into()),
        safe_methods: HashSet::from(["GET".to_string()]),
    }
}

#[actix_web::test]
async fn session_and_csrf_filters_wrap_the_reverse_proxy() {
    use actix_test::start;

    let upstream = start(|| {
        App::new().default_service(web::route().to(|| async { HttpResponse::Ok().body("upstream-ok") }))
    });
    let target_url = upstream.url("/");

    let backend = DefaultBackend::new(None);
    let state = GlobalState {
        sessions: SessionCache::new(backend.clone(), 24),
        identities: IdentityCache::new(backend, 24),
        logger: gateway_core::logger::LoggerBuilder::new().start().0,
        stop_handle: StopHandle::default(),
    }
    .build();

    let router_config = RouterConfig {
        target_url: Some(target_url),
        kind: RouterKind::ReverseProxy,
        pattern: "/app".into(),
        filters: vec![session_filter("session"), csrf_filter("csrf")],
        cache_adapter_identifier: Some("main".into()),
        success_login_url: None,
        access_token_request_url: None,
        user_info_request_url: None,
    };
    let config = gateway_core::config::GatewayConfig {
        port: 0,
        domain: "http://localhost:8080".into(),
        google_secret: None,
        log_level: gateway_core::config::LogLevel::Warn,
        routers: vec![router_config],
        cache_adapters: vec![],
    };

    let configure = router::build(config, state, reqwest::Client::new());
    let app = init_service(App::new().configure(configure)).await;

    let req = TestRequest::get().uri("/app/hello").to_request();
    let res = call_service(&app, req).await;
    assert!(res.status().is_success());
    assert!(res.headers().contains_key(actix_web::http::header::SET_COOKIE));
    assert!(res.headers().contains_key("x-csrf-token"));
}

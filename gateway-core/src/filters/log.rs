//! Log filter (spec.md §4.9): renders a user-supplied template per
//! request and emits it at INFO. Construction failures drop the filter
//! with a warning; render failures are logged but never abort the chain.
use std::sync::Arc;

use actix_web::dev::ServiceRequest;
use serde::Serialize;
use tinytemplate::TinyTemplate;
use tracing::{info, warn};

use super::{FilterFn, NextFn};

#[derive(Serialize)]
struct LogModel<'a> {
    filter_name: &'a str,
    method: &'a str,
    path: &'a str,
    query: &'a str,
    real_ip: String,
}

/// Compiles `template`, returning `None` (with a warning already logged)
/// if it fails to compile rather than panicking the assembler.
pub fn handler(name: String, template: &str) -> Option<FilterFn> {
    let mut engine = TinyTemplate::new();
    let owned_template = template.to_string();
    if let Err(e) = engine.add_template("log", &owned_template) {
        warn!(filter_name = %name, error = %e, "log filter template failed to compile, dropping filter");
        return None;
    }

    Some(Arc::new(move |req: ServiceRequest, next: NextFn| {
        let name = name.clone();
        let owned_template = owned_template.clone();
        Box::pin(async move {
            let mut engine = TinyTemplate::new();
            let _ = engine.add_template("log", &owned_template);

            let real_ip = req
                .extensions()
                .get::<Arc<crate::request::Extension>>()
                .map(|ext| ext.real_ip.to_string())
                .unwrap_or_default();

            let model = LogModel {
                filter_name: &name,
                method: req.method().as_str(),
                path: req.path(),
                query: req.query_string(),
                real_ip,
            };

            match engine.render("log", &model) {
                Ok(line) => info!(filter_name = %name, "{line}"),
                Err(e) => warn!(filter_name = %name, error = %e, "rendering log template failed"),
            }

            next(req).await
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use actix_web::HttpResponse;

    fn ok_next() -> NextFn {
        Arc::new(|req: ServiceRequest| {
            Box::pin(async move { Ok(req.into_response(HttpResponse::Ok().finish())) })
        })
    }

    #[test]
    fn a_broken_template_is_dropped_at_construction() {
        assert!(handler("access-log".into(), "{method unclosed").is_none());
    }

    #[tokio::test]
    async fn a_valid_template_always_lets_the_request_through() {
        let filter = handler("access-log".into(), "{method} {path}").unwrap();
        let req = TestRequest::get().uri("/hello").to_srv_request();
        let res = filter(req, ok_next()).await.unwrap();
        assert!(res.status().is_success());
    }
}

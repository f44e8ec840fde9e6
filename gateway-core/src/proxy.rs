//! Reverse-proxy terminal handler (spec.md §4.8): forwards the request
//! to a fixed upstream base URL, preserving path, query and body and
//! streaming the upstream response back unchanged.
use std::sync::Arc;

use actix_web::body::BoxBody;
use actix_web::dev::ServiceRequest;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{web, HttpResponse};
use reqwest::Client;
use tracing::error;
use url::Url;

use crate::filters::NextFn;

/// Headers that are connection-scoped and must never be forwarded,
/// per standard reverse-proxy hop-by-hop semantics.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Clone)]
pub struct ReverseProxy {
    target: Url,
    client: Client,
}

impl ReverseProxy {
    pub fn new(target: Url, client: Client) -> Self {
        Self { target, client }
    }

    /// Builds this router's terminal stage. Never calls `next` — it is
    /// the end of the chain.
    pub fn into_terminal(self) -> NextFn {
        Arc::new(move |req: ServiceRequest| {
            let this = self.clone();
            Box::pin(async move { this.forward(req).await })
        })
    }

    async fn forward(
        &self,
        req: ServiceRequest,
    ) -> Result<actix_web::dev::ServiceResponse<BoxBody>, actix_web::Error> {
        let mut upstream_url = self.target.clone();
        upstream_url.set_path(req.path());
        upstream_url.set_query(Some(req.query_string()).filter(|q| !q.is_empty()));

        let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
            .unwrap_or(reqwest::Method::GET);

        let mut upstream_req = self.client.request(method, upstream_url);
        for (name, value) in req.headers() {
            if HOP_BY_HOP.contains(&name.as_str().to_ascii_lowercase().as_str()) {
                continue;
            }
            if let Ok(value) = value.to_str() {
                upstream_req = upstream_req.header(name.as_str(), value);
            }
        }

        let (http_req, mut payload) = req.into_parts();
        let body = web::Bytes::from(read_body(&mut payload).await);
        upstream_req = upstream_req.body(body);

        let response = match upstream_req.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "reverse proxy upstream request failed");
                return Ok(actix_web::dev::ServiceResponse::new(
                    http_req,
                    HttpResponse::BadGateway().finish(),
                ));
            }
        };

        let status = actix_web::http::StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY);
        let mut builder = HttpResponse::build(status);
        for (name, value) in response.headers() {
            if HOP_BY_HOP.contains(&name.as_str().to_ascii_lowercase().as_str()) {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                builder.insert_header((name, value));
            }
        }

        let body = response.bytes().await.unwrap_or_default();
        Ok(actix_web::dev::ServiceResponse::new(http_req, builder.body(body)))
    }
}

async fn read_body(payload: &mut actix_web::dev::Payload) -> Vec<u8> {
    use futures::StreamExt as _;
    let mut out = Vec::new();
    while let Some(chunk) = payload.next().await {
        if let Ok(chunk) = chunk {
            out.extend_from_slice(&chunk);
        }
    }
    out
}

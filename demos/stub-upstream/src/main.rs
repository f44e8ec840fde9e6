//! Minimal upstream for exercising the gateway end-to-end: echoes the
//! method, path and headers it received, equivalent to
//! `examples/original_source/stubServer/server.go`.
use std::fmt::Write as _;

use gateway_core::actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};

async fn echo(req: HttpRequest) -> HttpResponse {
    let mut body = format!("{} {}\n\n", req.method(), req.uri());
    for (name, value) in req.headers() {
        let _ = writeln!(body, "{}={}", name, value.to_str().unwrap_or(""));
    }
    HttpResponse::Ok().body(body)
}

#[gateway_core::main]
async fn main() -> std::io::Result<()> {
    HttpServer::new(|| App::new().default_service(web::route().to(echo)))
        .bind(("127.0.0.1", 8081))?
        .run()
        .await
}

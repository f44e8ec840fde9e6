//! `gateway-core` implements the request pipeline and session/identity
//! state model for an authenticating reverse-proxy gateway: an ordered,
//! per-route chain of filters (session, CSRF, user-auth, identity
//! injection, logging) terminating in either a reverse proxy or an
//! OAuth2 authorization-code exchange.
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

#[cfg(feature = "macros")]
pub mod macros {
    pub use gateway_codegen::*;
}
pub use actix_web;
pub use anyhow;
pub use anyhow::bail;
#[cfg(feature = "macros")]
pub use macros::main;
pub use tokio;
pub use tracing;

pub mod error;
pub use error::{Error, Result};

pub mod cache;
pub mod config;
pub mod encryptor;
pub mod filters;
pub mod identity;
pub mod logger;
pub mod memorydb;
pub mod oauth;
pub mod proxy;
pub mod request;
pub mod router;
pub mod security;
pub mod state;

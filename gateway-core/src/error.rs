use std::{fmt, io};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    #[error("fmt error: {0}")]
    Fmt(#[from] fmt::Error),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("json error: {0}")]
    JSON(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("upstream request error: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("csrf error: {0}")]
    Csrf(String),

    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("template error: {0}")]
    Template(String),

    #[error("timestamp error: {0}")]
    Timestamp(&'static str),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

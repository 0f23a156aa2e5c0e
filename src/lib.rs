pub mod adapter;
pub mod api;
pub mod auth;
pub mod commands;
pub mod config;
pub mod connection;
pub mod credential;
pub mod factory;
pub mod grant;
pub mod http;
pub mod http_client;
pub mod parameters;
pub mod service_provider;

use thiserror::Error;

pub type ProviderId = String;

/// Provider id of Partner Center connections.
pub const PROVIDER_ID: &str = "partnercenter";

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("invalid persisted connection: `{0}`")]
    InvalidPersistedState(String),
    #[error("exchanging for access: `{0}`")]
    AuthExchangeFailed(#[from] auth::AuthExchangeError),
    #[error("no refresh token available for `{0}` connection")]
    RefreshUnavailable(ProviderId),
    #[error("calling partner center: `{0}`")]
    Api(#[from] api::ApiError),
}

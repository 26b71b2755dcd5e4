// authctl - library root, shared by the binary and the integration tests

pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod notify;
pub mod vault;

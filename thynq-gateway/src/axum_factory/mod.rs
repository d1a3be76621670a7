//! The HTTP server in front of the [`crate::Gateway`].
mod axum_http_server_factory;

pub use axum_http_server_factory::make_router;
pub(crate) use axum_http_server_factory::bind;
pub(crate) use axum_http_server_factory::serve;

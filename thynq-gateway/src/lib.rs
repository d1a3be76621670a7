//! A GraphQL query gateway exposing the `echo` and `ping` operations over HTTP.
//!
//! The [`Gateway`] parses, validates and executes GraphQL requests against an
//! immutable [`Schema`] registry. The [`Executable`] wires it to an `axum`
//! server with access control, CORS and an optional GraphiQL page.

#![warn(unreachable_pub)]

#[macro_use]
pub(crate) mod execution;

mod axum_factory;
pub mod configuration;
pub mod error;
mod executable;
mod gateway;
pub mod graphql;
pub mod json_ext;
mod operations;
mod security;
mod spec;

pub use axum_factory::make_router;
pub use configuration::Configuration;
pub use executable::Executable;
pub use executable::main;
pub use execution::Clock;
pub use execution::FixedClock;
pub use execution::SystemClock;
pub use gateway::Gateway;
pub use spec::Schema;

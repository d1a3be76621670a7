#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

mod arguments;
pub(crate) mod query;
mod schema;
mod validation;

pub(crate) use arguments::bind_root_arguments;
use displaydoc::Display;
pub(crate) use query::Query;
pub(crate) use schema::*;
pub use schema::Schema;
use thiserror::Error;
pub(crate) use validation::validate;

use crate::graphql::ErrorExtension;

pub(crate) const GRAPHQL_PARSE_FAILED: &str = "GRAPHQL_PARSE_FAILED";
pub(crate) const GRAPHQL_VALIDATION_FAILED: &str = "GRAPHQL_VALIDATION_FAILED";
pub(crate) const BAD_USER_INPUT: &str = "BAD_USER_INPUT";

/// GraphQL request errors detected before execution.
#[derive(Error, Debug, Display, Clone, PartialEq)]
#[non_exhaustive]
pub(crate) enum SpecError {
    /// Must provide query string.
    MissingQuery,
    /// Must provide an operation.
    NoOperation,
    /// Unknown operation named "{0}".
    UnknownOperation(String),
    /// Must provide operation name if query contains multiple operations.
    MissingOperationName,
    /// GraphQL introspection is not allowed, but the query contained __schema or __type.
    IntrospectionDisabled,
}

impl ErrorExtension for SpecError {
    fn extension_code(&self) -> String {
        GRAPHQL_VALIDATION_FAILED.to_string()
    }
}

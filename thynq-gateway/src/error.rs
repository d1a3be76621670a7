//! Gateway errors.

use displaydoc::Display;
use thiserror::Error;

pub use crate::configuration::ConfigurationError;

/// Inconsistent registrations found while building the schema.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    /// invalid type definitions: {0}
    InvalidDefinitions(String),
    /// the type definitions have no query type
    NoQueryType,
    /// operation "{0}" is registered more than once
    DuplicateOperation(String),
    /// operation "{0}" is not a field of the query type
    NotAQueryField(String),
    /// query field "{0}" has no registered operation
    MissingHandler(String),
    /// no operation is registered
    NoOperations,
}

/// Errors that prevent the gateway from starting or serving.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// could not create the schema: {0}
    SchemaError(#[from] SchemaError),
    /// could not load the configuration: {0}
    ConfigurationError(#[from] ConfigurationError),
    /// could not create the HTTP server: {0}
    ServerCreationError(std::io::Error),
}

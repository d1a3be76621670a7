//! Logic for loading configuration in to an object model

pub(crate) mod cors;
pub(crate) mod expansion;
pub(crate) mod server;

use std::path::Path;
use std::str::FromStr;

use displaydoc::Display;
use schemars::JsonSchema;
use schemars::r#gen::SchemaSettings;
use schemars::schema::RootSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub(crate) use self::cors::Cors;
pub(crate) use self::expansion::Expansion;
pub(crate) use self::server::Server;

/// Configuration error.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not expand variable: {key}, {cause}
    CannotExpandVariable { key: String, cause: String },
    /// could not expand variable: {key}. Variables must be prefixed with one of '{supported_modes}' followed by '.' e.g. 'env.'
    UnknownExpansionMode {
        key: String,
        supported_modes: String,
    },
    /// invalid expansion mode configuration
    InvalidExpansionModeConfig,
    /// could not read configuration file {path}: {error}
    CannotReadConfigFile {
        path: String,
        error: std::io::Error,
    },
    /// {message}: {error}
    InvalidConfiguration {
        message: &'static str,
        error: String,
    },
    /// could not deserialize configuration: {0}
    DeserializeConfigError(serde_json::Error),
}

/// The configuration for the gateway.
///
/// Usually read from a YAML file with [`Configuration::from_file`]; every section is optional.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// Configuration options pertaining to the http server component.
    pub(crate) server: Server,

    /// The GraphiQL exploration page.
    pub(crate) graphiql: Graphiql,

    /// Cross origin request headers.
    pub(crate) cors: Cors,

    /// Access control for everything besides the query endpoint.
    pub(crate) security: Security,
}

/// The GraphiQL exploration page.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub(crate) struct Graphiql {
    /// Serve the page.
    pub(crate) enabled: bool,
    /// Where the page is served.
    pub(crate) path: String,
}

impl Default for Graphiql {
    fn default() -> Self {
        Self {
            enabled: true,
            path: String::from("/graphiql"),
        }
    }
}

/// Access control settings.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub(crate) struct Security {
    /// The single user allowed on protected paths.
    pub(crate) user: User,
    /// Require the `X-XSRF-TOKEN` header to match the `XSRF-TOKEN` cookie on unsafe methods
    /// outside the query endpoint.
    pub(crate) csrf: bool,
}

impl Default for Security {
    fn default() -> Self {
        Self {
            user: User::default(),
            csrf: true,
        }
    }
}

/// HTTP Basic credentials.
#[derive(Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub(crate) struct User {
    pub(crate) name: String,
    /// A random password is generated and logged at startup when unset.
    pub(crate) password: Option<String>,
}

impl Default for User {
    fn default() -> Self {
        Self {
            name: String::from("user"),
            password: None,
        }
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[buildstructor::buildstructor]
impl Configuration {
    #[builder]
    pub(crate) fn new(
        server: Option<Server>,
        graphiql: Option<Graphiql>,
        cors: Option<Cors>,
        security: Option<Security>,
    ) -> Result<Self, ConfigurationError> {
        let configuration = Self {
            server: server.unwrap_or_default(),
            graphiql: graphiql.unwrap_or_default(),
            cors: cors.unwrap_or_default(),
            security: security.unwrap_or_default(),
        };
        configuration.validate()
    }
}

impl Configuration {
    /// Reads, expands and validates a YAML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        Self::from_file_with_expansion(path, &Expansion::default()?)
    }

    pub(crate) fn from_file_with_expansion(
        path: &Path,
        expansion: &Expansion,
    ) -> Result<Self, ConfigurationError> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            ConfigurationError::CannotReadConfigFile {
                path: path.display().to_string(),
                error,
            }
        })?;
        Self::parse(&raw, expansion)
    }

    /// Parses YAML, expands variables, deserializes then validates.
    pub(crate) fn parse(raw_yaml: &str, expansion: &Expansion) -> Result<Self, ConfigurationError> {
        let yaml: serde_json::Value = if raw_yaml.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_yaml::from_str(raw_yaml).map_err(|e| {
                ConfigurationError::InvalidConfiguration {
                    message: "failed to parse yaml",
                    error: e.to_string(),
                }
            })?
        };
        // A document holding only comments parses as null.
        let yaml = if yaml.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            yaml
        };
        let expanded = expansion.expand(&yaml)?;
        let configuration: Configuration =
            serde_json::from_value(expanded).map_err(ConfigurationError::DeserializeConfigError)?;
        configuration.validate()
    }

    pub(crate) fn validate(self) -> Result<Self, ConfigurationError> {
        let invalid = |message: &'static str, error: String| {
            Err(ConfigurationError::InvalidConfiguration { message, error })
        };
        if !self.server.graphql_path.starts_with('/') {
            return invalid(
                "invalid 'server.graphql_path' configuration",
                format!("'{}' must start with '/'", self.server.graphql_path),
            );
        }
        if !self.graphiql.path.starts_with('/') {
            return invalid(
                "invalid 'graphiql.path' configuration",
                format!("'{}' must start with '/'", self.graphiql.path),
            );
        }
        if self.graphiql.enabled && self.graphiql.path == self.server.graphql_path {
            return invalid(
                "invalid 'graphiql.path' configuration",
                format!(
                    "'{}' is already the path of the query endpoint",
                    self.graphiql.path
                ),
            );
        }
        if self.security.user.name.is_empty() {
            return invalid(
                "invalid 'security.user' configuration",
                "the user name must not be empty".to_string(),
            );
        }
        if self.security.user.name.contains(':') {
            return invalid(
                "invalid 'security.user' configuration",
                "the user name must not contain ':'".to_string(),
            );
        }
        if let Err(error) = self.cors.ensure_usable_cors_rules() {
            return invalid("invalid 'cors' configuration", error.to_string());
        }
        Ok(self)
    }
}

/// Parse configuration from a string in YAML syntax
impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, &Expansion::default()?)
    }
}

/// Generate a JSON schema for the configuration.
pub(crate) fn generate_config_schema() -> RootSchema {
    let settings = SchemaSettings::draft07().with(|s| {
        s.option_nullable = true;
        s.option_add_null_type = false;
        s.inline_subschemas = true;
    });
    settings
        .into_generator()
        .into_root_schema_for::<Configuration>()
}

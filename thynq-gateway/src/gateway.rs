//! The query gateway: parse, validate and execute one request.

use std::sync::Arc;

use apollo_compiler::parser::SourceMap;
use tracing::debug;

use crate::Configuration;
use crate::error::GatewayError;
use crate::execution::Clock;
use crate::execution::ExecutionContext;
use crate::execution::SystemClock;
use crate::execution::engine;
use crate::graphql::ErrorExtension;
use crate::graphql::Request;
use crate::graphql::Response;
use crate::spec::Query;
use crate::spec::Schema;
use crate::spec::SpecError;
use crate::spec::bind_root_arguments;
use crate::spec::query;
use crate::spec::query::ParserLimits;
use crate::spec::validate;

pub(crate) const DEFAULT_PARSER_RECURSION_LIMIT: usize = 500;
pub(crate) const DEFAULT_PARSER_TOKEN_LIMIT: usize = 15_000;

/// Executes GraphQL requests against the schema.
///
/// Cloning is cheap: the schema and clock are shared.
#[derive(Clone)]
pub struct Gateway {
    schema: Arc<Schema>,
    clock: Arc<dyn Clock>,
    introspection: bool,
    limits: ParserLimits,
}

#[buildstructor::buildstructor]
impl Gateway {
    /// Builds a gateway.
    ///
    /// Defaults: the `echo` and `ping` schema, the system clock, introspection enabled
    /// and the default parser limits.
    #[builder(visibility = "pub")]
    fn new(
        schema: Option<Arc<Schema>>,
        clock: Option<Arc<dyn Clock>>,
        introspection: Option<bool>,
        parser_recursion_limit: Option<usize>,
        parser_token_limit: Option<usize>,
    ) -> Result<Self, GatewayError> {
        let schema = match schema {
            Some(schema) => schema,
            None => Arc::new(Schema::new()?),
        };
        Ok(Self {
            schema,
            clock: clock.unwrap_or_else(|| Arc::new(SystemClock)),
            introspection: introspection.unwrap_or(true),
            limits: ParserLimits {
                recursion_limit: parser_recursion_limit.unwrap_or(DEFAULT_PARSER_RECURSION_LIMIT),
                token_limit: parser_token_limit.unwrap_or(DEFAULT_PARSER_TOKEN_LIMIT),
            },
        })
    }

    /// Builds a gateway with the introspection and parser settings of `configuration`.
    pub fn from_configuration(configuration: &Configuration) -> Result<Self, GatewayError> {
        let server = &configuration.server;
        Self::builder()
            .introspection(server.introspection)
            .parser_recursion_limit(server.parser_recursion_limit)
            .parser_token_limit(server.parser_token_limit)
            .build()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Runs `request`, turning every failure into response errors.
    #[tracing::instrument(skip_all, level = "debug")]
    pub fn execute(&self, request: &Request) -> Response {
        let context = ExecutionContext::new(self.clock.clone());

        let Some(source) = request
            .query
            .as_deref()
            .filter(|query| !query.trim().is_empty())
        else {
            debug!("request without a query");
            let error = SpecError::MissingQuery.to_graphql_error(None, &SourceMap::default(), None);
            return Response::from_errors(vec![error]);
        };

        let mut query = match Query::parse(source, self.limits) {
            Ok(query) => query,
            Err(errors) => return Response::from_errors(errors),
        };

        let operation_name = request.operation_name.as_deref();
        let argument_errors =
            bind_root_arguments(&self.schema, &mut query.document, operation_name);
        if !argument_errors.is_empty() {
            debug!("{} root fields removed for argument errors", argument_errors.len());
        }

        let document = match validate(
            &self.schema,
            &query,
            self.introspection,
            !argument_errors.is_empty(),
        ) {
            Ok(document) => document,
            Err(errors) => return Response::from_errors(errors),
        };

        let operation = match query::operation(&document, operation_name) {
            Ok(operation) => operation,
            Err(error) => {
                debug!("operation selection failed: {error}");
                return Response::from_errors(vec![error.to_graphql_error(
                    None,
                    &document.sources,
                    None,
                )]);
            }
        };

        let variables =
            match query::coerce_variables(&self.schema, &document, operation, &request.variables) {
                Ok(variables) => variables,
                Err(error) => return Response::from_errors(vec![error]),
            };

        let (data, execution_errors) = engine::execute(
            &self.schema,
            &document,
            operation,
            &variables,
            &context,
            self.introspection,
        );
        if !execution_errors.is_empty() {
            debug!("execution finished with {} field errors", execution_errors.len());
        }
        let mut errors = argument_errors;
        errors.extend(execution_errors);
        let data = data.filter(|data| !data.is_empty() || errors.is_empty());
        Response::builder().and_data(data).errors(errors).build()
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("introspection", &self.introspection)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

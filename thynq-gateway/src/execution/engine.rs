//! Runs an operation with the compiler's executor, resolving root fields through the
//! registered handlers.

use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;

use apollo_compiler::ExecutableDocument;
use apollo_compiler::executable;
use apollo_compiler::resolvers::Execution;
use apollo_compiler::resolvers::FieldError as CompilerFieldError;
use apollo_compiler::resolvers::ObjectValue;
use apollo_compiler::resolvers::ResolveInfo;
use apollo_compiler::resolvers::ResolvedValue;
use apollo_compiler::response::ExecutionResponse;
use apollo_compiler::response::JsonMap;
use apollo_compiler::validation::Valid;
use tracing::warn;

use crate::execution::ExecutionContext;
use crate::execution::FieldError;
use crate::execution::INTERNAL_SERVER_ERROR;
use crate::graphql;
use crate::json_ext::Object;
use crate::json_ext::PathElement;
use crate::json_ext::Value;
use crate::spec::Schema;

/// Added by the executor in front of every resolver message.
const RESOLVER_ERROR_PREFIX: &str = "resolver error: ";

/// The query root: each field is answered by its registered handler.
struct RootResolver<'a> {
    schema: &'a Schema,
    context: &'a ExecutionContext,
}

impl ObjectValue for RootResolver<'_> {
    fn type_name(&self) -> &str {
        self.schema.query_type_name()
    }

    fn resolve_field<'a>(
        &'a self,
        info: &'a ResolveInfo<'a>,
    ) -> Result<ResolvedValue<'a>, CompilerFieldError> {
        let Some(operation) = self.schema.operation(info.field_name()) else {
            return Err(self.unknown_field_error(info));
        };
        let handler = operation.handler;
        match catch_unwind(AssertUnwindSafe(|| handler(info.arguments(), self.context))) {
            Ok(Ok(value)) => Ok(widen(value)),
            Ok(Err(error)) => Err(error.into()),
            Err(_) => {
                warn!(field = info.field_name(), "operation handler panicked");
                Err(FieldError::Panicked {
                    field: info.field_name().to_string(),
                }
                .into())
            }
        }
    }
}

/// Handlers return owned values, usable for any borrow of the resolver.
fn widen<'a>(value: ResolvedValue<'static>) -> ResolvedValue<'a> {
    match value {
        ResolvedValue::Leaf(json) => ResolvedValue::Leaf(json),
        ResolvedValue::Object(object) => ResolvedValue::Object(object),
        ResolvedValue::List(items) => {
            ResolvedValue::List(Box::new(items.map(|item| item.map(widen))))
        }
        ResolvedValue::SkipForPartialExecution => ResolvedValue::SkipForPartialExecution,
    }
}

/// <https://spec.graphql.org/October2021/#ExecuteQuery()>
///
/// Returns the response data and the field errors. A root field that failed is left out
/// of the data, and the data is absent when nothing is left and some field failed.
pub(crate) fn execute(
    schema: &Schema,
    document: &Valid<ExecutableDocument>,
    operation: &executable::Operation,
    variables: &Valid<JsonMap>,
    context: &ExecutionContext,
    introspection: bool,
) -> (Option<Object>, Vec<graphql::Error>) {
    let root = RootResolver { schema, context };
    let response = Execution::new(&schema.definitions, document)
        .operation(operation)
        .coerced_variable_values(variables)
        .enable_schema_introspection(introspection)
        .execute_sync(&root);
    let ExecutionResponse { data, errors } = match response {
        Ok(response) => response,
        Err(error) => {
            let error = with_code(graphql::Error::from(
                error.to_graphql_error(&document.sources),
            ));
            return (None, vec![error]);
        }
    };

    let errors = errors
        .into_iter()
        .map(|mut error| {
            if let Some(message) = error.message.strip_prefix(RESOLVER_ERROR_PREFIX) {
                error.message = message.to_string();
            }
            with_code(graphql::Error::from(error))
        })
        .collect::<Vec<_>>();

    let data = data.and_then(|mut data| {
        data.retain(|key, value| !(value.is_null() && failed(&errors, key.as_str())));
        (!data.is_empty() || errors.is_empty()).then_some(data)
    });
    (data, errors)
}

/// Whether some error lies at or below the root field `response_key`.
fn failed(errors: &[graphql::Error], response_key: &str) -> bool {
    errors.iter().any(|error| {
        error
            .path
            .as_ref()
            .and_then(|path| path.iter().next())
            .is_some_and(|first| matches!(first, PathElement::Key(key) if key == response_key))
    })
}

fn with_code(mut error: graphql::Error) -> graphql::Error {
    error
        .extensions
        .entry("code")
        .or_insert_with(|| Value::String(INTERNAL_SERVER_ERROR.into()));
    error
}

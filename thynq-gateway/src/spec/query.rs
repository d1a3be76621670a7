//! Query document parsing, operation selection and variable coercion.

use apollo_compiler::ExecutableDocument;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::executable;
use apollo_compiler::parser::Parser;
use apollo_compiler::request::coerce_variable_values;
use apollo_compiler::response::JsonMap;
use apollo_compiler::validation::Valid;
use tracing::debug;

use crate::graphql;
use crate::json_ext::Value;
use crate::spec::BAD_USER_INPUT;
use crate::spec::GRAPHQL_PARSE_FAILED;
use crate::spec::Schema;
use crate::spec::SpecError;

/// Bounds on the work the parser does for a single document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ParserLimits {
    pub(crate) recursion_limit: usize,
    pub(crate) token_limit: usize,
}

/// A parsed query document, not yet validated.
#[derive(Debug)]
pub(crate) struct Query {
    pub(crate) document: ast::Document,
}

impl Query {
    /// Parses `source`, reporting every syntax error with code `GRAPHQL_PARSE_FAILED`.
    pub(crate) fn parse(source: &str, limits: ParserLimits) -> Result<Self, Vec<graphql::Error>> {
        let document = Parser::new()
            .recursion_limit(limits.recursion_limit)
            .token_limit(limits.token_limit)
            .parse_ast(source, "query.graphql")
            .map_err(|with_errors| {
                debug!("parsing error: {}", with_errors.errors);
                with_errors
                    .errors
                    .iter()
                    .map(|diagnostic| {
                        let mut error = graphql::Error::from(diagnostic.to_json());
                        error
                            .extensions
                            .insert("code", Value::String(GRAPHQL_PARSE_FAILED.into()));
                        error
                    })
                    .collect::<Vec<_>>()
            })?;
        Ok(Query { document })
    }
}

/// Selects the operation to run.
///
/// With no name the document must hold exactly one operation.
pub(crate) fn operation<'doc>(
    document: &'doc Valid<ExecutableDocument>,
    name: Option<&str>,
) -> Result<&'doc Node<executable::Operation>, SpecError> {
    document.operations.get(name).map_err(|_| match name {
        Some(name) => SpecError::UnknownOperation(name.to_string()),
        None if document.operations.iter().next().is_none() => SpecError::NoOperation,
        None => SpecError::MissingOperationName,
    })
}

/// <https://spec.graphql.org/October2021/#CoerceVariableValues()>
///
/// Stops at the first variable that is missing, null for a non-null type, or of the
/// wrong type, reporting it with code `BAD_USER_INPUT`.
pub(crate) fn coerce_variables(
    schema: &Schema,
    document: &Valid<ExecutableDocument>,
    operation: &executable::Operation,
    provided: &JsonMap,
) -> Result<Valid<JsonMap>, graphql::Error> {
    coerce_variable_values(&schema.definitions, operation, provided).map_err(|error| {
        debug!("variable coercion failed: {}", error.message());
        let mut error = graphql::Error::from(error.to_graphql_error(&document.sources));
        error
            .extensions
            .insert("code", Value::String(BAD_USER_INPUT.into()));
        error
    })
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    const LIMITS: ParserLimits = ParserLimits {
        recursion_limit: 500,
        token_limit: 15_000,
    };

    fn executable(schema: &Schema, source: &str) -> Valid<ExecutableDocument> {
        ExecutableDocument::parse_and_validate(&schema.definitions, source, "query.graphql")
            .unwrap()
    }

    fn variables(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn syntax_errors_are_located() {
        let errors = Query::parse("{ echo(message: \"hi\") { original ", LIMITS).unwrap_err();
        assert!(!errors.is_empty());
        assert_eq!(
            errors[0].extension_code().as_deref(),
            Some(GRAPHQL_PARSE_FAILED)
        );
        assert!(!errors[0].locations.is_empty());
    }

    #[test]
    fn token_limit_is_enforced() {
        let limits = ParserLimits {
            recursion_limit: 500,
            token_limit: 10,
        };
        let source = format!("{{ {} }}", "ping { status } ".repeat(20));
        assert!(Query::parse(&source, limits).is_err());
    }

    #[test]
    fn recursion_limit_is_enforced() {
        let limits = ParserLimits {
            recursion_limit: 3,
            token_limit: 15_000,
        };
        let source = format!("{{ {}b{} }}", "a { ".repeat(10), " }".repeat(10));
        assert!(Query::parse(&source, limits).is_err());
    }

    #[test]
    fn operation_selection() {
        let schema = Schema::new().unwrap();
        let document = executable(
            &schema,
            "query A { ping { status } } query B { echo(message: \"x\") { length } }",
        );
        let b = operation(&document, Some("B")).unwrap();
        assert_eq!(b.name.as_ref().unwrap().as_str(), "B");
        assert_eq!(
            operation(&document, Some("C")).unwrap_err(),
            SpecError::UnknownOperation("C".to_string())
        );
        assert_eq!(
            operation(&document, None).unwrap_err(),
            SpecError::MissingOperationName
        );

        let single = executable(&schema, "{ ping { status } }");
        assert!(operation(&single, None).is_ok());
        assert!(operation(&single, Some("A")).is_err());
    }

    #[test]
    fn variables_take_defaults_and_reject_bad_values() {
        let schema = Schema::new().unwrap();
        let document = executable(
            &schema,
            "query Q($a: String!, $b: String! = \"dflt\", $c: Boolean) { \
             echo(message: $a) { length } e: echo(message: $b) { length } \
             ping @skip(if: $c) { status } }",
        );
        let query = operation(&document, None).unwrap();

        let coerced =
            coerce_variables(&schema, &document, query, &variables(json!({ "a": "x" }))).unwrap();
        assert_eq!(coerced.get("a"), Some(&json!("x")));
        assert_eq!(coerced.get("b"), Some(&json!("dflt")));
        assert!(!coerced.contains_key("c"));

        let null = coerce_variables(&schema, &document, query, &variables(json!({ "a": null })))
            .unwrap_err();
        assert_eq!(null.extension_code().as_deref(), Some(BAD_USER_INPUT));
        assert!(null.message.contains("non-null"), "{}", null.message);

        let wrong_type = coerce_variables(
            &schema,
            &document,
            query,
            &variables(json!({ "a": "x", "c": "not a boolean" })),
        )
        .unwrap_err();
        assert!(wrong_type.message.contains("Boolean"), "{}", wrong_type.message);

        let missing = coerce_variables(&schema, &document, query, &JsonMap::new()).unwrap_err();
        assert_eq!(missing.message, "missing value for non-null variable 'a'");
        assert_eq!(missing.locations[0].line, 1);
    }
}

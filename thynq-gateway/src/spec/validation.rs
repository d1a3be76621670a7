//! Document-wide validation, run before any handler.

use apollo_compiler::ExecutableDocument;
use apollo_compiler::validation::Valid;
use tracing::debug;

use crate::graphql;
use crate::graphql::ErrorExtension;
use crate::json_ext::Value;
use crate::spec::GRAPHQL_VALIDATION_FAILED;
use crate::spec::Query;
use crate::spec::Schema;
use crate::spec::SpecError;

const SCHEMA_FIELD: &str = "__schema";
const TYPE_FIELD: &str = "__type";

/// Diagnostics that only follow from root fields removed for argument errors.
const AFTER_REMOVAL: [&str; 2] = ["UnusedVariable", "UnusedFragment"];

/// Validates `query` against `schema`, returning every error found.
///
/// `fields_removed` tells that argument binding already removed root fields, which may
/// leave variables or fragments unused.
pub(crate) fn validate(
    schema: &Schema,
    query: &Query,
    introspection: bool,
    fields_removed: bool,
) -> Result<Valid<ExecutableDocument>, Vec<graphql::Error>> {
    let document = match query.document.to_executable_validate(&schema.definitions) {
        Ok(document) => document,
        Err(with_errors) => {
            let errors = with_errors
                .errors
                .iter()
                .filter(|diagnostic| {
                    !fields_removed
                        || !diagnostic
                            .error
                            .unstable_error_name()
                            .is_some_and(|name| AFTER_REMOVAL.contains(&name))
                })
                .map(|diagnostic| {
                    let mut error = graphql::Error::from(diagnostic.unstable_to_json_compat());
                    error
                        .extensions
                        .insert("code", Value::String(GRAPHQL_VALIDATION_FAILED.into()));
                    error
                })
                .collect::<Vec<_>>();
            if !errors.is_empty() {
                debug!("validation failed with {} errors", errors.len());
                return Err(errors);
            }
            Valid::assume_valid(with_errors.partial)
        }
    };

    if !introspection {
        let errors = document
            .operations
            .iter()
            .flat_map(|operation| operation.root_fields(&document))
            .filter(|field| matches!(field.name.as_str(), SCHEMA_FIELD | TYPE_FIELD))
            .map(|field| {
                SpecError::IntrospectionDisabled.to_graphql_error(
                    field.location(),
                    &document.sources,
                    None,
                )
            })
            .collect::<Vec<_>>();
        if !errors.is_empty() {
            return Err(errors);
        }
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::spec::bind_root_arguments;
    use crate::spec::query::ParserLimits;

    fn errors_for(source: &str, introspection: bool) -> Vec<String> {
        let schema = Schema::new().unwrap();
        let mut query = Query::parse(
            source,
            ParserLimits {
                recursion_limit: 500,
                token_limit: 15_000,
            },
        )
        .unwrap();
        let removed = !bind_root_arguments(&schema, &mut query.document, None).is_empty();
        let errors = match validate(&schema, &query, introspection, removed) {
            Ok(_) => return Vec::new(),
            Err(errors) => errors,
        };
        assert!(
            errors
                .iter()
                .all(|e| e.extension_code().as_deref() == Some(GRAPHQL_VALIDATION_FAILED))
        );
        errors.into_iter().map(|e| e.message).collect()
    }

    #[rstest]
    #[case::plain("{ echo(message: \"hi\") { original reversed length timestamp } }")]
    #[case::argument_errors_are_bound_per_field("{ echo { original } ping { status } }")]
    #[case::removed_field_leaves_unused_variable(
        "query Q($s: Boolean!) { echo(message: 1) { length @skip(if: $s) } ping { status } }"
    )]
    #[case::aliases("{ a: echo(message: \"1\") { length } b: echo(message: \"2\") { length } }")]
    #[case::typename("{ __typename ping { __typename status } }")]
    #[case::named_fragment("{ ping { ...P } } fragment P on PingResponse { status latency }")]
    #[case::inline_fragment("{ ping { ... on PingResponse { status } ... @include(if: true) { latency } } }")]
    #[case::variables("query Q($m: String!, $s: Boolean!) { echo(message: $m) { length @skip(if: $s) } }")]
    #[case::introspection("{ __schema { types { name } } __type(name: \"EchoResponse\") { fields { name } } }")]
    #[case::merged_fields("{ ping { status status } ping { latency } }")]
    #[case::same_arguments_merge(
        "{ e: echo(message: \"ab\") { original } e: echo(message: \"ab\") { length } }"
    )]
    fn valid_documents(#[case] source: &str) {
        assert_eq!(errors_for(source, true), Vec::<String>::new());
    }

    #[rstest]
    #[case::unknown_root_field("{ invalidQuery }", "Cannot query field \"invalidQuery\" on type \"Query\".")]
    #[case::unknown_nested_field(
        "{ echo(message: \"x\") { original nope } }",
        "Cannot query field \"nope\" on type \"EchoResponse\"."
    )]
    #[case::missing_subselection(
        "{ ping }",
        "Field \"ping\" of type \""
    )]
    #[case::leaf_subselection(
        "{ ping { status { x } } }",
        "Field \"status\" must not have a selection since type \"String"
    )]
    #[case::unknown_argument("{ ping(x: 1) { status } }", "Unknown argument \"x\" on field \"")]
    #[case::unknown_fragment("{ ping { ...Nope } }", "Unknown fragment \"Nope\".")]
    #[case::inapplicable_fragment(
        "{ ping { ...E } } fragment E on EchoResponse { length }",
        "Fragment \"E\" cannot be spread here as objects of type \"PingResponse\" can never be of type \"EchoResponse\"."
    )]
    #[case::unknown_type_condition(
        "{ ping { ... on Nope { status } } }",
        "Unknown type \"Nope\"."
    )]
    #[case::unknown_directive("{ ping @nope { status } }", "Unknown directive \"@nope\".")]
    #[case::missing_directive_argument(
        "{ ping @skip { status } }",
        "Directive \"@skip\" argument \"if\" of type \"Boolean!\" is required, but it was not provided."
    )]
    #[case::misplaced_directive(
        "query @skip(if: true) { ping { status } }",
        "Directive \"@skip\" may not be used on "
    )]
    #[case::undefined_variable(
        "{ echo(message: $m) { length } }",
        "Variable \"$m\" is not defined"
    )]
    #[case::object_variable(
        "query Q($p: PingResponse) { ping { status } }",
        "Variable \"$p\" cannot be non-input type \"PingResponse\"."
    )]
    #[case::conflicting_aliases(
        "{ ping { x: status x: latency } }",
        "Fields \"x\" conflict because \"status\" and \"latency\" are different fields."
    )]
    #[case::same_key_different_arguments(
        "{ echo(message: \"a\") { original } echo(message: \"b\") { original } }",
        "Fields \"echo\" conflict because they have differing arguments."
    )]
    #[case::conflicting_merged_subselections(
        "{ e: echo(message:\"ab\") { x: original } e: echo(message:\"ab\") { x: reversed } }",
        "Fields \"x\" conflict because \"original\" and \"reversed\" are different fields."
    )]
    #[case::mutation(
        "mutation { ping { status } }",
        "The schema has no \"mutation\" root type defined"
    )]
    #[case::subscription(
        "subscription { ping { status } }",
        "The schema has no \"subscription\" root type defined"
    )]
    #[case::duplicate_operations(
        "query A { ping { status } } query A { ping { latency } }",
        "There can be only one operation named \"A\"."
    )]
    #[case::lone_anonymous(
        "{ ping { status } } query A { ping { latency } }",
        "This anonymous operation must be the only defined operation."
    )]
    #[case::type_system_definition(
        "type Foo { a: String } { ping { status } }",
        "The \"Foo\" definition is not executable."
    )]
    #[case::unused_variable(
        "query Q($m: String) { ping { status } }",
        "Variable \"$m\" is never used"
    )]
    fn invalid_documents(#[case] source: &str, #[case] message: &str) {
        let errors = errors_for(source, true);
        assert!(
            errors.iter().any(|error| error.starts_with(message)),
            "expected {message:?} in {errors:?}"
        );
    }

    #[test]
    fn fragment_cycles_are_rejected() {
        let errors = errors_for(
            "{ ping { ...A } } fragment A on PingResponse { ...B } fragment B on PingResponse { ...A }",
            true,
        );
        assert!(!errors.is_empty());
        assert!(
            errors
                .iter()
                .all(|error| error.starts_with("Cannot spread fragment \"")),
            "{errors:?}"
        );
    }

    #[test]
    fn undefined_variables_inside_fragments_are_found() {
        let errors = errors_for(
            "query Q { ...F } fragment F on Query { echo(message: $m) { length } }",
            true,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Variable \"$m\" is not defined"), "{errors:?}");
    }

    #[test]
    fn introspection_can_be_disabled() {
        let expected =
            ["GraphQL introspection is not allowed, but the query contained __schema or __type."];
        assert_eq!(errors_for("{ __schema { queryType { name } } }", false), expected);
        assert_eq!(
            errors_for("{ ...Types } fragment Types on Query { __type(name: \"Query\") { name } }", false),
            expected
        );
        assert!(errors_for("{ __typename ping { status } }", false).is_empty());
    }

    #[test]
    fn errors_are_located() {
        let schema = Schema::new().unwrap();
        let query = Query::parse(
            "{\n  ping { status }\n  nope\n}",
            ParserLimits {
                recursion_limit: 500,
                token_limit: 15_000,
            },
        )
        .unwrap();
        let errors = validate(&schema, &query, true, false).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].locations,
            [graphql::Location { line: 3, column: 3 }]
        );
        assert!(errors[0].path.is_none());
    }
}

//! The schema registry: GraphQL type definitions and the operation registration table.

use apollo_compiler::ast::OperationType;
use apollo_compiler::resolvers::ResolvedValue;
use apollo_compiler::response::JsonMap;
use apollo_compiler::validation::Valid;
use indexmap::IndexMap;

use crate::error::SchemaError;
use crate::execution::ExecutionContext;
use crate::execution::FieldError;
use crate::operations;

/// Resolves one root field from its coerced arguments.
pub(crate) type Handler =
    fn(&JsonMap, &ExecutionContext) -> Result<ResolvedValue<'static>, FieldError>;

/// A registered root operation: a field of the query type and the handler answering it.
#[derive(Clone, Debug)]
pub(crate) struct Operation {
    pub(crate) name: &'static str,
    pub(crate) handler: Handler,
}

impl Operation {
    pub(crate) fn new(name: &'static str, handler: Handler) -> Self {
        Self { name, handler }
    }
}

/// The immutable schema: validated type definitions plus one handler per query field.
pub struct Schema {
    pub(crate) definitions: Valid<apollo_compiler::Schema>,
    operations: IndexMap<&'static str, Operation>,
}

impl Schema {
    /// The `echo` and `ping` schema.
    pub fn new() -> Result<Self, SchemaError> {
        operations::register(Self::builder()).build()
    }

    pub(crate) fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub(crate) fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    /// Name of the root query type.
    pub(crate) fn query_type_name(&self) -> &str {
        self.definitions
            .root_operation(OperationType::Query)
            .map(|name| name.as_str())
            .unwrap_or("Query")
    }

    /// The schema in GraphQL SDL, without built-in definitions.
    pub fn to_sdl(&self) -> String {
        self.definitions.to_string()
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub(crate) struct SchemaBuilder {
    type_definitions: Vec<&'static str>,
    operations: Vec<Operation>,
}

impl SchemaBuilder {
    /// Adds SDL type definitions.
    pub(crate) fn type_definitions(mut self, sdl: &'static str) -> Self {
        self.type_definitions.push(sdl);
        self
    }

    pub(crate) fn operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Validates the definitions and checks that handlers and query fields match one to one.
    pub(crate) fn build(self) -> Result<Schema, SchemaError> {
        if self.operations.is_empty() {
            return Err(SchemaError::NoOperations);
        }
        let mut builder = apollo_compiler::Schema::builder();
        for sdl in &self.type_definitions {
            builder = builder.parse(*sdl, "schema.graphql");
        }
        let definitions = builder
            .build()
            .and_then(|schema| schema.validate())
            .map_err(|with_errors| SchemaError::InvalidDefinitions(with_errors.errors.to_string()))?;

        let query_type = definitions
            .root_operation(OperationType::Query)
            .and_then(|name| definitions.get_object(name))
            .ok_or(SchemaError::NoQueryType)?;

        let mut operations = IndexMap::new();
        for operation in self.operations {
            if !query_type.fields.contains_key(operation.name) {
                return Err(SchemaError::NotAQueryField(operation.name.to_string()));
            }
            if operations.insert(operation.name, operation.clone()).is_some() {
                return Err(SchemaError::DuplicateOperation(operation.name.to_string()));
            }
        }
        if let Some(field) = query_type
            .fields
            .keys()
            .find(|field| !operations.contains_key(field.as_str()))
        {
            return Err(SchemaError::MissingHandler(field.to_string()));
        }

        Ok(Schema {
            definitions,
            operations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THING: &str = "type Query { thing: Thing other: Thing } type Thing { a: String }";

    fn noop(_: &JsonMap, _: &ExecutionContext) -> Result<ResolvedValue<'static>, FieldError> {
        Ok(ResolvedValue::null())
    }

    #[test]
    fn printed_sdl() {
        let schema = Schema::new().unwrap();
        insta::assert_snapshot!(schema.to_sdl());
    }

    #[test]
    fn operations_are_query_fields() {
        let schema = Schema::new().unwrap();
        assert_eq!(schema.query_type_name(), "Query");
        assert!(schema.operation("echo").is_some());
        assert!(schema.operation("ping").is_some());
        assert!(schema.operation("EchoResponse").is_none());
        let echo = schema.definitions.type_field("Query", "echo").unwrap();
        assert_eq!(echo.ty.to_string(), "EchoResponse");
        assert_eq!(echo.arguments[0].ty.to_string(), "String!");
    }

    #[test]
    fn registrations_are_checked() {
        let duplicate = Schema::builder()
            .type_definitions(THING)
            .operation(Operation::new("thing", noop))
            .operation(Operation::new("other", noop))
            .operation(Operation::new("thing", noop))
            .build();
        assert!(matches!(duplicate, Err(SchemaError::DuplicateOperation(name)) if name == "thing"));

        let unknown = Schema::builder()
            .type_definitions(THING)
            .operation(Operation::new("thing", noop))
            .operation(Operation::new("other", noop))
            .operation(Operation::new("missing", noop))
            .build();
        assert!(matches!(unknown, Err(SchemaError::NotAQueryField(name)) if name == "missing"));

        let unhandled = Schema::builder()
            .type_definitions(THING)
            .operation(Operation::new("thing", noop))
            .build();
        assert!(matches!(unhandled, Err(SchemaError::MissingHandler(name)) if name == "other"));

        let invalid = Schema::builder()
            .type_definitions("type Query { thing: Missing }")
            .operation(Operation::new("thing", noop))
            .build();
        assert!(matches!(invalid, Err(SchemaError::InvalidDefinitions(_))));

        let no_query = Schema::builder()
            .type_definitions("type Thing { a: String }")
            .operation(Operation::new("thing", noop))
            .build();
        assert!(matches!(
            no_query,
            Err(SchemaError::NoQueryType | SchemaError::InvalidDefinitions(_))
        ));

        assert!(matches!(
            Schema::builder().type_definitions(THING).build(),
            Err(SchemaError::NoOperations)
        ));
    }
}

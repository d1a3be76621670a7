//! Binding of literal arguments on root fields.
//!
//! A root field whose literal arguments cannot be bound is removed from the document
//! before validation, leaving one error at the field's response key. Its sibling fields
//! still execute. Arguments given through variables are coerced with the variables.

use std::collections::HashSet;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::parser::SourceMap;
use apollo_compiler::schema::ExtendedType;
use displaydoc::Display;
use thiserror::Error;
use tracing::debug;

use crate::graphql;
use crate::graphql::ErrorExtension;
use crate::json_ext::Path;
use crate::spec::GRAPHQL_VALIDATION_FAILED;
use crate::spec::Schema;

/// Why a literal does not fit its declared type.
#[derive(Error, Display, Debug, Clone, PartialEq)]
pub(crate) enum ValueError {
    /// Expected a non-null value of type "{0}".
    Null(String),
    /// {type_name} cannot represent value: {value}
    Mismatch { type_name: String, value: String },
    /// Unknown input type "{0}".
    UnknownType(String),
}

/// Failure to bind one argument of a field.
#[derive(Error, Display, Debug, Clone, PartialEq)]
pub(crate) enum ArgumentError {
    /// Field "{field}" argument "{argument}" of type "{type_name}" is required, but it was not provided.
    MissingArgument {
        field: String,
        argument: String,
        type_name: String,
    },
    /// Argument "{argument}" of non-null type "{type_name}" must not be null.
    NullArgument { argument: String, type_name: String },
    /// Argument "{argument}" has invalid value: {reason}
    InvalidArgument { argument: String, reason: ValueError },
}

impl ErrorExtension for ArgumentError {
    fn extension_code(&self) -> String {
        GRAPHQL_VALIDATION_FAILED.to_string()
    }
}

/// Removes the root fields of the selected operation whose literal arguments cannot be
/// bound, returning one error per removed field.
///
/// Root fields are found through inline fragments and named fragments on the query type.
/// Fragments are pruned in place, so a fragment spread from several operations is pruned
/// for all of them.
pub(crate) fn bind_root_arguments(
    schema: &Schema,
    document: &mut ast::Document,
    operation_name: Option<&str>,
) -> Vec<graphql::Error> {
    let sources = document.sources.clone();
    let mut binder = Binder {
        schema,
        sources: &sources,
        fragments: Vec::new(),
        errors: Vec::new(),
    };

    let Some(operation) = selected_operation(document, operation_name) else {
        return Vec::new();
    };
    if operation.operation_type != ast::OperationType::Query {
        return Vec::new();
    }
    binder.prune(&mut operation.make_mut().selection_set);

    let query_type = schema.query_type_name().to_string();
    let mut seen = HashSet::new();
    while let Some(name) = binder.fragments.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        // only the first definition of a name is kept by validation
        let fragment = document.definitions.iter_mut().find_map(|definition| match definition {
            ast::Definition::FragmentDefinition(fragment) if fragment.name == name => {
                Some(fragment)
            }
            _ => None,
        });
        if let Some(fragment) =
            fragment.filter(|fragment| fragment.type_condition.as_str() == query_type)
        {
            binder.prune(&mut fragment.make_mut().selection_set);
        }
    }

    if !binder.errors.is_empty() {
        debug!("{} root fields removed for argument errors", binder.errors.len());
    }
    binder.errors
}

fn selected_operation<'doc>(
    document: &'doc mut ast::Document,
    operation_name: Option<&str>,
) -> Option<&'doc mut Node<ast::OperationDefinition>> {
    let mut operations = document
        .definitions
        .iter_mut()
        .filter_map(|definition| match definition {
            ast::Definition::OperationDefinition(operation) => Some(operation),
            _ => None,
        });
    match operation_name {
        Some(name) => operations
            .find(|operation| operation.name.as_ref().is_some_and(|n| n.as_str() == name)),
        None => {
            let first = operations.next();
            if operations.next().is_some() {
                None
            } else {
                first
            }
        }
    }
}

struct Binder<'a> {
    schema: &'a Schema,
    sources: &'a SourceMap,
    fragments: Vec<Name>,
    errors: Vec<graphql::Error>,
}

impl Binder<'_> {
    fn prune(&mut self, selections: &mut Vec<ast::Selection>) {
        let schema = self.schema;
        let query_type = schema.query_type_name();
        selections.retain_mut(|selection| match selection {
            ast::Selection::Field(field) => {
                let Ok(definition) = schema.definitions.type_field(query_type, &field.name) else {
                    return true;
                };
                let Some(error) = argument_errors(schema, definition, field)
                    .into_iter()
                    .next()
                else {
                    return true;
                };
                self.errors.push(error.to_graphql_error(
                    field.location(),
                    self.sources,
                    Some(Path::from(vec![field.response_name().as_str()])),
                ));
                false
            }
            ast::Selection::InlineFragment(inline) => {
                if inline
                    .type_condition
                    .as_ref()
                    .is_none_or(|condition| condition == query_type)
                {
                    self.prune(&mut inline.make_mut().selection_set);
                }
                true
            }
            ast::Selection::FragmentSpread(spread) => {
                self.fragments.push(spread.fragment_name.clone());
                true
            }
        });
    }
}

/// The errors binding the literal arguments of `field` against its definition.
pub(crate) fn argument_errors(
    schema: &Schema,
    definition: &ast::FieldDefinition,
    field: &ast::Field,
) -> Vec<ArgumentError> {
    let mut errors = Vec::new();
    for argument in &definition.arguments {
        let provided = field
            .arguments
            .iter()
            .find(|provided| provided.name == argument.name);
        match provided {
            None if argument.is_required() => errors.push(ArgumentError::MissingArgument {
                field: field.name.to_string(),
                argument: argument.name.to_string(),
                type_name: argument.ty.to_string(),
            }),
            None => {}
            Some(provided) if provided.value.is_null() && argument.ty.is_non_null() => {
                errors.push(ArgumentError::NullArgument {
                    argument: argument.name.to_string(),
                    type_name: argument.ty.to_string(),
                })
            }
            Some(provided) => {
                if let Err(reason) = check_literal(schema, &argument.ty, &provided.value) {
                    errors.push(ArgumentError::InvalidArgument {
                        argument: argument.name.to_string(),
                        reason,
                    })
                }
            }
        }
    }
    errors
}

/// <https://spec.graphql.org/October2021/#sec-Input-Values>
///
/// Variables are accepted anywhere: their values are checked when variables are coerced.
pub(crate) fn check_literal(
    schema: &Schema,
    ty: &ast::Type,
    value: &ast::Value,
) -> Result<(), ValueError> {
    if let ast::Value::Variable(_) = value {
        return Ok(());
    }
    if value.is_null() {
        return if ty.is_non_null() {
            Err(ValueError::Null(ty.to_string()))
        } else {
            Ok(())
        };
    }
    match ty {
        ast::Type::List(item) | ast::Type::NonNullList(item) => match value {
            ast::Value::List(items) => items
                .iter()
                .try_for_each(|value| check_literal(schema, item, value)),
            // A single value is accepted where a list is expected
            single => check_literal(schema, item, single),
        },
        ast::Type::Named(name) | ast::Type::NonNullNamed(name) => {
            check_named(schema, name, value)
        }
    }
}

fn check_named(schema: &Schema, name: &Name, value: &ast::Value) -> Result<(), ValueError> {
    let mismatch = || ValueError::Mismatch {
        type_name: name.to_string(),
        value: value.serialize().no_indent().to_string(),
    };
    match schema.definitions.types.get(name) {
        Some(ExtendedType::Scalar(_)) => {
            let fits = match (name.as_str(), value) {
                ("String", ast::Value::String(_)) => true,
                ("Int", ast::Value::Int(int)) => int.try_to_i32().is_ok(),
                ("Float", ast::Value::Float(_) | ast::Value::Int(_)) => true,
                ("Boolean", ast::Value::Boolean(_)) => true,
                ("ID", ast::Value::String(_) | ast::Value::Int(_)) => true,
                ("String" | "Int" | "Float" | "Boolean" | "ID", _) => false,
                // custom scalars are passed through as-is
                _ => true,
            };
            if fits { Ok(()) } else { Err(mismatch()) }
        }
        Some(ExtendedType::Enum(definition)) => match value {
            ast::Value::Enum(value) if definition.values.contains_key(value) => Ok(()),
            _ => Err(mismatch()),
        },
        Some(ExtendedType::InputObject(definition)) => {
            let ast::Value::Object(fields) = value else {
                return Err(mismatch());
            };
            if fields
                .iter()
                .any(|(field, _)| !definition.fields.contains_key(field))
            {
                return Err(mismatch());
            }
            for (field_name, field) in &definition.fields {
                match fields.iter().find(|(provided, _)| provided == field_name) {
                    Some((_, provided)) => check_literal(schema, &field.ty, provided)?,
                    None if field.is_required() => return Err(mismatch()),
                    None => {}
                }
            }
            Ok(())
        }
        _ => Err(ValueError::UnknownType(name.to_string())),
    }
}

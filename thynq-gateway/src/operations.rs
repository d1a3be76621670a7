//! The registered operations and their result shapes.

use apollo_compiler::resolvers::ResolvedValue;
use apollo_compiler::response::JsonMap;
use serde_json::Number;

use crate::execution::ExecutionContext;
use crate::execution::FieldError;
use crate::json_ext::Value;
use crate::spec::Operation;
use crate::spec::SchemaBuilder;

const PONG: &str = "pong";

const TYPE_DEFINITIONS: &str = r#"
"""A message sent back along with its reversal and length."""
type EchoResponse {
  """The message as received."""
  original: String!
  """The characters of the message in reverse order."""
  reversed: String!
  """The number of characters in the message."""
  length: Int!
  """When the response was produced, as an RFC 3339 UTC instant."""
  timestamp: String!
}

"""Liveness information about the gateway."""
type PingResponse {
  """Always "pong"."""
  status: String!
  """Seconds spent on the request before the ping was answered."""
  latency: Float!
  """When the response was produced, as an RFC 3339 UTC instant."""
  timestamp: String!
}

type Query {
  """Sends a message back, reversed and measured."""
  echo(message: String!): EchoResponse
  """Checks that the gateway answers."""
  ping: PingResponse
}
"#;

/// Adds `echo` and `ping` with their result types to the registration table.
pub(crate) fn register(builder: SchemaBuilder) -> SchemaBuilder {
    builder
        .type_definitions(TYPE_DEFINITIONS)
        .operation(Operation::new("echo", echo))
        .operation(Operation::new("ping", ping))
}

fn echo(arguments: &JsonMap, context: &ExecutionContext) -> Result<ResolvedValue<'static>, FieldError> {
    let message = arguments
        .get("message")
        .and_then(Value::as_str)
        .ok_or_else(|| FieldError::Handler("echo requires a message".to_string()))?;
    Ok(ResolvedValue::object(EchoResponse::new(
        message,
        context.timestamp(),
    )))
}

fn ping(_: &JsonMap, context: &ExecutionContext) -> Result<ResolvedValue<'static>, FieldError> {
    Ok(ResolvedValue::object(PingResponse {
        latency: context.elapsed_seconds(),
        timestamp: context.timestamp(),
    }))
}

/// Lengths and reversal work on `char`s: grapheme clusters are not kept together.
struct EchoResponse {
    original: String,
    reversed: String,
    length: usize,
    timestamp: String,
}

impl EchoResponse {
    fn new(message: &str, timestamp: String) -> Self {
        Self {
            original: message.to_string(),
            reversed: message.chars().rev().collect(),
            length: message.chars().count(),
            timestamp,
        }
    }
}

impl_resolver! {
    for EchoResponse:
    __typename = "EchoResponse";
    "original" => |self_| Ok(ResolvedValue::leaf(self_.original.as_str())),
    "reversed" => |self_| Ok(ResolvedValue::leaf(self_.reversed.as_str())),
    // larger than Int allows fails result coercion
    "length" => |self_| Ok(ResolvedValue::Leaf(Value::Number(Number::from(self_.length)))),
    "timestamp" => |self_| Ok(ResolvedValue::leaf(self_.timestamp.as_str())),
}

struct PingResponse {
    latency: f64,
    timestamp: String,
}

impl_resolver! {
    for PingResponse:
    __typename = "PingResponse";
    "status" => |_self| Ok(ResolvedValue::leaf(PONG)),
    "latency" => |self_| Ok(ResolvedValue::Leaf(
        Number::from_f64(self_.latency).map_or(Value::Null, Value::Number)
    )),
    "timestamp" => |self_| Ok(ResolvedValue::leaf(self_.timestamp.as_str())),
}

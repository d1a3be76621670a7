use std::net::SocketAddr;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::gateway::DEFAULT_PARSER_RECURSION_LIMIT;
use crate::gateway::DEFAULT_PARSER_TOKEN_LIMIT;

const DEFAULT_LISTEN: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 8080);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
// 2 MB
const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Configuration for the HTTP server and the query endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub(crate) struct Server {
    /// The socket address to listen on.
    #[schemars(with = "String")]
    pub(crate) listen: SocketAddr,

    /// The path of the query endpoint.
    pub(crate) graphql_path: String,

    /// Whether `__schema` and `__type` may be queried.
    pub(crate) introspection: bool,

    /// How long a request may take before the server answers `408`.
    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub(crate) request_timeout: Duration,

    /// The largest accepted request body, in bytes.
    pub(crate) max_request_body_size: usize,

    /// Deepest nesting the query parser accepts.
    pub(crate) parser_recursion_limit: usize,

    /// Most tokens the query parser accepts in one document.
    pub(crate) parser_token_limit: usize,
}

#[buildstructor::buildstructor]
impl Server {
    #[builder]
    pub(crate) fn new(
        listen: Option<SocketAddr>,
        graphql_path: Option<String>,
        introspection: Option<bool>,
        request_timeout: Option<Duration>,
        max_request_body_size: Option<usize>,
        parser_recursion_limit: Option<usize>,
        parser_token_limit: Option<usize>,
    ) -> Self {
        Self {
            listen: listen.unwrap_or(DEFAULT_LISTEN),
            graphql_path: graphql_path.unwrap_or_else(default_graphql_path),
            introspection: introspection.unwrap_or(true),
            request_timeout: request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            max_request_body_size: max_request_body_size.unwrap_or(DEFAULT_MAX_REQUEST_BODY_SIZE),
            parser_recursion_limit: parser_recursion_limit
                .unwrap_or(DEFAULT_PARSER_RECURSION_LIMIT),
            parser_token_limit: parser_token_limit.unwrap_or(DEFAULT_PARSER_TOKEN_LIMIT),
        }
    }
}

fn default_graphql_path() -> String {
    String::from("/graphql")
}

impl Default for Server {
    fn default() -> Self {
        Server::builder().build()
    }
}

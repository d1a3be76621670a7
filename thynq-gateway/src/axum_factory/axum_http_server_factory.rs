//! Axum http server: routes, layers and the listener.

use std::future::Future;
use std::net::SocketAddr;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::RawQuery;
use axum::extract::State;
use axum::middleware;
use axum::response::Html;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use http::HeaderMap;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use mime::Mime;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::Configuration;
use crate::configuration::ConfigurationError;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::graphql;
use crate::security;
use crate::security::AccessControl;

/// Builds the HTTP routes: the query endpoint, the optional GraphiQL page, access control
/// and CORS.
pub fn make_router(configuration: &Configuration, gateway: Gateway) -> Result<Router, GatewayError> {
    let cors = configuration.cors.clone().into_layer().map_err(|error| {
        ConfigurationError::InvalidConfiguration {
            message: "CORS configuration error",
            error,
        }
    })?;
    let server = &configuration.server;

    let mut router = Router::new().route(
        &server.graphql_path,
        get(handle_get).post(handle_post).with_state(gateway),
    );
    if configuration.graphiql.enabled {
        let page = graphiql_page(&server.graphql_path);
        router = router.route(
            &configuration.graphiql.path,
            get(move || {
                let page = page.clone();
                async move { Html(page) }
            }),
        );
    }

    Ok(router
        .layer(middleware::from_fn_with_state(
            AccessControl::new(configuration),
            security::enforce,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(server.max_request_body_size))
        .layer(TimeoutLayer::new(server.request_timeout))
        .layer(TraceLayer::new_for_http()))
}

/// Binds the configured listen address.
pub(crate) async fn bind(configuration: &Configuration) -> Result<TcpListener, GatewayError> {
    TcpListener::bind(configuration.server.listen)
        .await
        .map_err(GatewayError::ServerCreationError)
}

/// Serves `router` on `listener` until `shutdown` resolves, then drains open connections.
pub(crate) async fn serve(
    listener: TcpListener,
    router: Router,
    graphql_path: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), GatewayError> {
    let address: SocketAddr = listener
        .local_addr()
        .map_err(GatewayError::ServerCreationError)?;
    tracing::info!("GraphQL endpoint exposed at http://{address}{graphql_path} 🚀");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(GatewayError::ServerCreationError)?;
    tracing::info!("server stopped");
    Ok(())
}

fn graphiql_page(graphql_path: &str) -> String {
    const TEMPLATE: &str = include_str!("../../templates/graphiql_index.html");
    // a JSON string is a valid JavaScript string literal
    let url = serde_json::Value::String(graphql_path.to_string()).to_string();
    TEMPLATE.replace("{{GRAPHQL_PATH}}", &url)
}

#[tracing::instrument(skip_all)]
async fn handle_get(State(gateway): State<Gateway>, RawQuery(query): RawQuery) -> Response {
    let request = match query.map(graphql::Request::from_urlencoded_query) {
        Some(Ok(request)) if request.query.is_some() => request,
        Some(Err(error)) => {
            tracing::debug!("cannot decode the query string: {error}");
            return (
                StatusCode::BAD_REQUEST,
                format!("Invalid GraphQL request: {error}"),
            )
                .into_response();
        }
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                "Invalid GraphQL request: a GET request must have a 'query' parameter",
            )
                .into_response();
        }
    };
    execute(gateway, request).await
}

#[tracing::instrument(skip_all)]
async fn handle_post(State(gateway): State<Gateway>, headers: HeaderMap, body: Bytes) -> Response {
    if !is_json(&headers) {
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Invalid GraphQL request: the 'content-type' header must be 'application/json'",
        )
            .into_response();
    }
    let request: graphql::Request = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(error) => {
            tracing::debug!("cannot decode the request body: {error}");
            return (
                StatusCode::BAD_REQUEST,
                format!("Invalid GraphQL request: {error}"),
            )
                .into_response();
        }
    };
    execute(gateway, request).await
}

/// Runs the request on the blocking pool, so that the request timeout can answer while
/// handlers are still working.
async fn execute(gateway: Gateway, request: graphql::Request) -> Response {
    match tokio::task::spawn_blocking(move || gateway.execute(&request)).await {
        Ok(response) => Json(response).into_response(),
        Err(error) => {
            tracing::error!("request execution failed: {error}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Mime>().ok())
        .is_some_and(|mime| {
            mime.type_() == mime::APPLICATION
                && (mime.subtype() == mime::JSON || mime.suffix() == Some(mime::JSON))
        })
}

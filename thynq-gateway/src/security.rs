//! Access control in front of every route.
//!
//! The query endpoint and the GraphiQL page are public. Any other path needs HTTP Basic
//! credentials. Unsafe methods outside the query endpoint also need a CSRF token: the
//! `X-XSRF-TOKEN` header must repeat the `XSRF-TOKEN` cookie.

use std::sync::Arc;

use axum::extract::Request;
use axum::extract::State;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use base64::Engine as _;
use base64::engine::general_purpose;
use cookie::Cookie;
use http::HeaderMap;
use http::Method;
use http::StatusCode;
use http::header;

use crate::Configuration;

pub(crate) const CSRF_COOKIE: &str = "XSRF-TOKEN";
pub(crate) const CSRF_HEADER: &str = "x-xsrf-token";
const REALM: &str = "Basic realm=\"thynq\"";

#[derive(Clone, Debug)]
pub(crate) struct AccessControl {
    inner: Arc<Rules>,
}

#[derive(Debug)]
struct Rules {
    graphql_path: String,
    graphiql_path: Option<String>,
    user: String,
    password: String,
    csrf: bool,
}

impl AccessControl {
    /// Reads the rules from `configuration`, generating a password when none is set.
    pub(crate) fn new(configuration: &Configuration) -> Self {
        let security = &configuration.security;
        let password = match &security.user.password {
            Some(password) => password.clone(),
            None => {
                let generated = uuid::Uuid::new_v4().to_string();
                tracing::warn!(
                    "Using generated security password: {generated}\n\nThis generated password is for development use only."
                );
                generated
            }
        };
        Self {
            inner: Arc::new(Rules {
                graphql_path: configuration.server.graphql_path.clone(),
                graphiql_path: configuration
                    .graphiql
                    .enabled
                    .then(|| configuration.graphiql.path.clone()),
                user: security.user.name.clone(),
                password,
                csrf: security.csrf,
            }),
        }
    }

    fn is_public(&self, path: &str) -> bool {
        path == self.inner.graphql_path || self.inner.graphiql_path.as_deref() == Some(path)
    }

    /// The query endpoint and everything below it.
    fn is_csrf_exempt(&self, path: &str) -> bool {
        let prefix = self.inner.graphql_path.trim_end_matches('/');
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    fn has_csrf_token(&self, headers: &HeaderMap) -> bool {
        let Some(token) = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) else {
            return false;
        };
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .filter(|cookie| cookie.name() == CSRF_COOKIE)
            .any(|cookie| !token.is_empty() && constant_time_eq(cookie.value(), token))
    }

    fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };
        let Some(encoded) = value
            .split_once(' ')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("basic"))
            .map(|(_, encoded)| encoded.trim())
        else {
            return false;
        };
        let Ok(decoded) = general_purpose::STANDARD.decode(encoded) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };
        let Some((user, password)) = decoded.split_once(':') else {
            return false;
        };
        // evaluate both so that timing does not reveal which one differs
        let user_matches = constant_time_eq(user, &self.inner.user);
        let password_matches = constant_time_eq(password, &self.inner.password);
        user_matches && password_matches
    }
}

fn is_unsafe(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Middleware applying the CSRF check, then authentication.
pub(crate) async fn enforce(
    State(access): State<AccessControl>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    let headers = request.headers();

    if access.inner.csrf
        && is_unsafe(request.method())
        && !access.is_csrf_exempt(path)
        && !access.has_csrf_token(headers)
    {
        tracing::debug!(path, "rejecting request without a valid CSRF token");
        return (StatusCode::FORBIDDEN, "Invalid CSRF token").into_response();
    }

    if access.is_public(path) || access.is_authenticated(headers) {
        return next.run(request).await;
    }

    tracing::debug!(path, "rejecting unauthenticated request");
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, REALM)],
        "Unauthorized",
    )
        .into_response()
}

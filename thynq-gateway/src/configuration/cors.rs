//! Cross Origin Resource Sharing (CORS configuration)

use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use tower_http::cors;
use tower_http::cors::CorsLayer;

/// Cross origin request configuration.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub(crate) struct Cors {
    /// Set to true to allow any origin.
    ///
    /// Cannot be combined with `allow_credentials`.
    pub(crate) allow_any_origin: bool,

    /// Set to true to add the `Access-Control-Allow-Credentials` header.
    pub(crate) allow_credentials: bool,

    /// The headers to allow.
    /// When empty, the headers listed in `Access-Control-Request-Headers` are mirrored.
    pub(crate) allow_headers: Vec<String>,

    /// Which response headers scripts running in the browser may read.
    pub(crate) expose_headers: Vec<String>,

    /// The origins to allow requests from. None by default.
    pub(crate) origins: Vec<String>,

    /// Allowed request methods. Defaults to GET, POST, OPTIONS.
    pub(crate) methods: Vec<String>,

    /// The `Access-Control-Max-Age` header value in time units.
    #[serde(with = "humantime_serde")]
    #[schemars(with = "Option<String>")]
    pub(crate) max_age: Option<Duration>,
}

impl Default for Cors {
    fn default() -> Self {
        Cors::builder().build()
    }
}

fn default_cors_methods() -> Vec<String> {
    vec!["GET".into(), "POST".into(), "OPTIONS".into()]
}

#[buildstructor::buildstructor]
impl Cors {
    #[builder]
    pub(crate) fn new(
        allow_any_origin: Option<bool>,
        allow_credentials: Option<bool>,
        allow_headers: Vec<String>,
        expose_headers: Vec<String>,
        origins: Vec<String>,
        methods: Option<Vec<String>>,
        max_age: Option<Duration>,
    ) -> Self {
        Self {
            allow_any_origin: allow_any_origin.unwrap_or_default(),
            allow_credentials: allow_credentials.unwrap_or_default(),
            allow_headers,
            expose_headers,
            origins,
            methods: methods.unwrap_or_else(default_cors_methods),
            max_age,
        }
    }
}

impl Cors {
    pub(crate) fn into_layer(self) -> Result<CorsLayer, String> {
        self.ensure_usable_cors_rules()?;

        let allow_headers = if self.allow_headers.is_empty() {
            cors::AllowHeaders::mirror_request()
        } else {
            cors::AllowHeaders::list(self.allow_headers.iter().filter_map(|header| {
                header
                    .parse()
                    .map_err(|_| tracing::error!("header name '{header}' is not valid"))
                    .ok()
            }))
        };
        let mut layer = CorsLayer::new()
            .allow_credentials(self.allow_credentials)
            .allow_headers(allow_headers)
            .expose_headers(cors::ExposeHeaders::list(
                self.expose_headers.iter().filter_map(|header| {
                    header
                        .parse()
                        .map_err(|_| tracing::error!("header name '{header}' is not valid"))
                        .ok()
                }),
            ))
            .allow_methods(cors::AllowMethods::list(self.methods.iter().filter_map(
                |method| {
                    method
                        .parse()
                        .map_err(|_| tracing::error!("method '{method}' is not valid"))
                        .ok()
                },
            )));
        if let Some(max_age) = self.max_age {
            layer = layer.max_age(max_age);
        }

        if self.allow_any_origin {
            Ok(layer.allow_origin(cors::Any))
        } else {
            Ok(layer.allow_origin(cors::AllowOrigin::list(
                self.origins.iter().filter_map(|origin| {
                    origin
                        .parse()
                        .map_err(|_| tracing::error!("origin '{origin}' is not valid"))
                        .ok()
                }),
            )))
        }
    }

    // tower-http panics on unusable rules; report them as configuration errors instead.
    pub(crate) fn ensure_usable_cors_rules(&self) -> Result<(), &'static str> {
        if self.allow_credentials {
            if self.allow_headers.iter().any(|x| x == "*") {
                return Err("Invalid CORS configuration: Cannot combine `Access-Control-Allow-Credentials: true` \
                        with `Access-Control-Allow-Headers: *`");
            }

            if self.methods.iter().any(|x| x == "*") {
                return Err("Invalid CORS configuration: Cannot combine `Access-Control-Allow-Credentials: true` \
                    with `Access-Control-Allow-Methods: *`");
            }

            if self.allow_any_origin || self.origins.iter().any(|x| x == "*") {
                return Err("Invalid CORS configuration: Cannot combine `Access-Control-Allow-Credentials: true` \
                    with `Access-Control-Allow-Origin: *`");
            }

            if self.expose_headers.iter().any(|x| x == "*") {
                return Err("Invalid CORS configuration: Cannot combine `Access-Control-Allow-Credentials: true` \
                    with `Access-Control-Expose-Headers: *`");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_no_origin() {
        let cors = Cors::default();
        assert!(!cors.allow_any_origin);
        assert!(cors.origins.is_empty());
        assert_eq!(cors.methods, ["GET", "POST", "OPTIONS"]);
        assert!(cors.into_layer().is_ok());
    }

    #[test]
    fn credentials_with_any_origin_are_rejected() {
        let cors = Cors::builder()
            .allow_any_origin(true)
            .allow_credentials(true)
            .build();
        assert_eq!(
            cors.into_layer().unwrap_err(),
            "Invalid CORS configuration: Cannot combine `Access-Control-Allow-Credentials: true` \
                    with `Access-Control-Allow-Origin: *`"
        );
    }

    #[test]
    fn credentials_with_wildcard_headers_are_rejected() {
        let cors = Cors::builder()
            .allow_credentials(true)
            .allow_headers(vec!["*".to_string()])
            .origins(vec!["https://example.com".to_string()])
            .build();
        assert!(cors.ensure_usable_cors_rules().is_err());
    }
}

//! Environment variable expansion in the configuration file

use std::collections::HashMap;
use std::env;
use std::env::VarError;
use std::fs;
use std::net::SocketAddr;

use serde_json::Value;

use super::ConfigurationError;

const ENV_PREFIX_VAR: &str = "THYNQ_CONFIG_ENV_PREFIX";
const SUPPORTED_MODES_VAR: &str = "THYNQ_CONFIG_SUPPORTED_MODES";

#[derive(buildstructor::Builder, Clone, Debug)]
pub(crate) struct Expansion {
    prefix: Option<String>,
    supported_modes: Vec<String>,
    override_configs: Vec<Override>,
    #[cfg(test)]
    mocked_env_vars: HashMap<String, String>,
}

/// A value forced into the configuration, whatever the file says.
#[derive(buildstructor::Builder, Clone, Debug)]
pub(crate) struct Override {
    /// Dot separated path of the value, e.g. `server.listen`.
    config_path: String,
    value: Value,
}

#[buildstructor::buildstructor]
impl Expansion {
    pub(crate) fn default() -> Result<Self, ConfigurationError> {
        Self::default_builder().build()
    }

    /// Expansion driven by the process environment, with the command line overrides.
    #[builder]
    pub(crate) fn default_new(
        #[cfg_attr(not(test), allow(unused))] mocked_env_vars: HashMap<String, String>,
        listen: Option<SocketAddr>,
    ) -> Result<Self, ConfigurationError> {
        let prefix = match env::var(ENV_PREFIX_VAR) {
            Ok(v) => Some(v),
            Err(VarError::NotPresent) => None,
            Err(VarError::NotUnicode(_)) => Err(ConfigurationError::InvalidExpansionModeConfig)?,
        };

        let supported_expansion_modes = match env::var(SUPPORTED_MODES_VAR) {
            Ok(v) => v,
            Err(VarError::NotPresent) => "env,file".to_string(),
            Err(VarError::NotUnicode(_)) => Err(ConfigurationError::InvalidExpansionModeConfig)?,
        };
        let supported_modes = supported_expansion_modes
            .split(',')
            .map(|mode| mode.trim().to_string())
            .collect::<Vec<String>>();

        let overrides = listen.map(|listen| {
            Override::builder()
                .config_path("server.listen")
                .value(Value::String(listen.to_string()))
                .build()
        });

        let builder = Expansion::builder();
        #[cfg(test)]
        let builder = builder.mocked_env_vars(mocked_env_vars);
        Ok(builder
            .and_prefix(prefix)
            .supported_modes(supported_modes)
            .override_configs(overrides.into_iter().collect::<Vec<_>>())
            .build())
    }
}

impl Expansion {
    fn context_fn(&self) -> impl Fn(&str) -> Result<Option<String>, ConfigurationError> + '_ {
        move |key: &str| {
            if !self
                .supported_modes
                .iter()
                .any(|prefix| key.starts_with(prefix.as_str()))
            {
                return Err(ConfigurationError::UnknownExpansionMode {
                    key: key.to_string(),
                    supported_modes: self.supported_modes.join("|"),
                });
            }

            if let Some(key) = key.strip_prefix("env.") {
                return self.expand_env(key);
            }
            if let Some(key) = key.strip_prefix("file.") {
                if !std::path::Path::new(key).exists() {
                    return Ok(None);
                }

                return fs::read_to_string(key).map(Some).map_err(|cause| {
                    ConfigurationError::CannotExpandVariable {
                        key: key.to_string(),
                        cause: format!("{cause}"),
                    }
                });
            }
            Err(ConfigurationError::InvalidExpansionModeConfig)
        }
    }

    fn expand_env(&self, key: &str) -> Result<Option<String>, ConfigurationError> {
        match self.prefix.as_ref() {
            None => self.get_env(key),
            Some(prefix) => self.get_env(&format!("{prefix}_{key}")),
        }
        .map(Some)
        .map_err(|cause| ConfigurationError::CannotExpandVariable {
            key: key.to_string(),
            cause: format!("{cause}"),
        })
    }

    fn get_env(&self, name: &str) -> Result<String, VarError> {
        #[cfg(test)]
        if let Some(value) = self.mocked_env_vars.get(name) {
            return Ok(value.clone());
        }
        env::var(name)
    }

    /// Expands every `${mode.key}` reference, then applies the overrides.
    pub(crate) fn expand(&self, configuration: &Value) -> Result<Value, ConfigurationError> {
        let mut configuration = configuration.clone();
        self.visit(&mut configuration)?;
        for override_config in &self.override_configs {
            override_config.apply(&mut configuration)?;
        }
        Ok(configuration)
    }

    fn visit(&self, value: &mut Value) -> Result<(), ConfigurationError> {
        let mut expanded: Option<String> = None;
        match value {
            Value::String(value) => {
                let new_value =
                    shellexpand::env_with_context(value, self.context_fn()).map_err(|e| e.cause)?;
                if &new_value != value {
                    expanded = Some(new_value.to_string());
                }
            }
            Value::Array(a) => {
                for v in a {
                    self.visit(v)?
                }
            }
            Value::Object(o) => {
                for v in o.values_mut() {
                    self.visit(v)?
                }
            }
            _ => {}
        }
        // The expansion may have resulted in a primitive, reparse and replace
        if let Some(expanded) = expanded {
            *value = coerce(&expanded)
        }
        Ok(())
    }
}

impl Override {
    fn apply(&self, configuration: &mut Value) -> Result<(), ConfigurationError> {
        let invalid = || ConfigurationError::InvalidConfiguration {
            message: "could not apply configuration overrides as the source configuration had an invalid structure",
            error: format!("{} is not inside an object", self.config_path),
        };
        let mut current = configuration;
        let mut segments = self.config_path.split('.').peekable();
        while let Some(segment) = segments.next() {
            if current.is_null() {
                *current = Value::Object(Default::default());
            }
            let object = current.as_object_mut().ok_or_else(invalid)?;
            if segments.peek().is_none() {
                object.insert(segment.to_string(), self.value.clone());
                return Ok(());
            }
            current = object.entry(segment).or_insert(Value::Null);
        }
        Ok(())
    }
}

pub(crate) fn coerce(expanded: &str) -> Value {
    match serde_yaml::from_str(expanded) {
        Ok(Value::Bool(b)) => Value::Bool(b),
        Ok(Value::Number(n)) => Value::Number(n),
        Ok(Value::Null) => Value::Null,
        _ => Value::String(expanded.to_string()),
    }
}

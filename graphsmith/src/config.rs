//! Compiler configuration is based on a [CompilerConfigProvider], which is used to retrieve
//! [CompilerConfig]. [Compiler](crate::compiler::Compiler) uses this config to configure itself
//! and the resolution engine.
//!
//! By default, the config is created with opinionated default values, which can then be overwritten
//! by environment variables prefixed with `GRAPHSMITH_` or `graphsmith.json` file.

use config::{Config, ConfigError, Environment, File};
use graphsmith_di::composition::ResolverOptions;
use graphsmith_di::plan::ErrorPtr;
use graphsmith_di::registry::AutoBindingPolicy;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use std::sync::Arc;

const CONFIG_ENV_PREFIX: &str = "GRAPHSMITH";

/// Name of the default config file.
pub const CONFIG_FILE: &str = "graphsmith.json";

/// Compiler configuration which can be provided by a [CompilerConfigProvider].
#[non_exhaustive]
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CompilerConfig {
    /// Should a default tracing logger be installed when compiling.
    pub install_tracing_logger: bool,
    /// Should shared instance slots use double-checked locking.
    pub thread_safe: bool,
    /// Should closed constructible types be resolvable without an explicit binding.
    pub auto_binding: bool,
    /// Maximum number of nested requests in a single root.
    pub max_resolution_depth: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            install_tracing_logger: true,
            thread_safe: true,
            auto_binding: true,
            max_resolution_depth: 256,
        }
    }
}

impl From<OptionalCompilerConfig> for CompilerConfig {
    fn from(value: OptionalCompilerConfig) -> Self {
        let default = Self::default();
        Self {
            install_tracing_logger: value
                .install_tracing_logger
                .unwrap_or(default.install_tracing_logger),
            thread_safe: value.thread_safe.unwrap_or(default.thread_safe),
            auto_binding: value.auto_binding.unwrap_or(default.auto_binding),
            max_resolution_depth: value
                .max_resolution_depth
                .unwrap_or(default.max_resolution_depth),
        }
    }
}

impl From<&CompilerConfig> for ResolverOptions {
    fn from(config: &CompilerConfig) -> Self {
        Self {
            thread_safe: config.thread_safe,
            max_resolution_depth: config.max_resolution_depth,
            auto_binding: if config.auto_binding {
                AutoBindingPolicy::default()
            } else {
                AutoBindingPolicy::disabled()
            },
        }
    }
}

impl CompilerConfig {
    fn init_from_environment() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(CONFIG_ENV_PREFIX))
            .build()
            .and_then(|config| config.try_deserialize::<OptionalCompilerConfig>())
            .map(|config| config.into())
    }
}

/// Provider for [CompilerConfig].
#[cfg_attr(test, automock)]
pub trait CompilerConfigProvider {
    fn config(&self) -> Result<CompilerConfig, ErrorPtr>;
}

/// Loads the config from the default file and environment once, on construction.
#[derive(Clone, Debug)]
pub struct DefaultCompilerConfigProvider {
    // cached init result
    config: Result<CompilerConfig, ErrorPtr>,
}

impl DefaultCompilerConfigProvider {
    pub fn new() -> Self {
        Self {
            config: CompilerConfig::init_from_environment()
                .map_err(|error| Arc::new(error) as ErrorPtr),
        }
    }
}

impl Default for DefaultCompilerConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerConfigProvider for DefaultCompilerConfigProvider {
    fn config(&self) -> Result<CompilerConfig, ErrorPtr> {
        self.config.clone()
    }
}

#[derive(Deserialize, Default)]
struct OptionalCompilerConfig {
    install_tracing_logger: Option<bool>,
    thread_safe: Option<bool>,
    auto_binding: Option<bool>,
    max_resolution_depth: Option<usize>,
}

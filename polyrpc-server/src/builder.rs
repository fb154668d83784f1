//! Site builder
//!
//! The builder pattern provides a fluent API for configuring and creating a
//! [`JsonRpcSite`]. It allows you to:
//! - Name and describe the service
//! - Register procedures
//! - Configure batch processing
//! - Add middleware
//! - Plug in a result encoder
//! - Enable metrics and observability
//!
//! # Examples
//!
//! ```rust
//! use polyrpc_server::{from_fn, BatchMode, JsonRpcSite, Procedure};
//!
//! # fn example() -> polyrpc_core::Result<()> {
//! let site = JsonRpcSite::builder()
//!     .name("calculator")
//!     .summary("Arithmetic over JSON-RPC")
//!     .procedure(Procedure::new("ping", from_fn(|_, _| async {
//!         Ok(serde_json::json!("pong"))
//!     })))
//!     .batch_mode(BatchMode::Sequential)
//!     .max_batch_size(100)
//!     .debug_from_env()
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::batch::{BatchMode, BatchProcessor};
use crate::describe::{DescribeHandler, ServiceInfo};
use crate::dispatcher::Dispatcher;
use crate::encoder::ResultEncoder;
use crate::metrics::DispatchMetrics;
use crate::middleware::{Middleware, MiddlewareChain, SyncMiddleware};
use crate::procedure::Procedure;
use crate::registry::Registry;
use crate::JsonRpcSite;
use polyrpc_core::{Error, ObservabilityConfig, Result};
use std::sync::Arc;

/// Environment variable enabling diagnostic mode
pub const DEBUG_ENV: &str = "POLYRPC_DEBUG";

/// Resolved site settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub name: String,
    pub version: String,
    pub summary: String,
    /// Expose internal failure details in error envelopes
    pub debug: bool,
    pub batch_mode: BatchMode,
    pub max_batch_size: Option<usize>,
    /// Method under which the site describes itself
    pub describe_method: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "polyrpc".to_string(),
            version: "1.0".to_string(),
            summary: "A JSON-RPC Site".to_string(),
            debug: false,
            batch_mode: BatchMode::default(),
            max_batch_size: None,
            describe_method: "system.describe".to_string(),
        }
    }
}

impl SiteConfig {
    /// Defaults, with diagnostic mode read from `POLYRPC_DEBUG`
    pub fn from_env() -> Self {
        Self {
            debug: debug_from_env(),
            ..Self::default()
        }
    }
}

fn debug_from_env() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| parse_flag(&value))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

/// Builder for constructing a JSON-RPC site
pub struct SiteBuilder {
    config: SiteConfig,
    procedures: Vec<Procedure>,
    encoder: Option<Arc<dyn ResultEncoder>>,
    middleware_chain: MiddlewareChain,
    metrics: bool,
    observability_config: Option<ObservabilityConfig>,
}

impl SiteBuilder {
    /// Create a new site builder with default settings
    pub fn new() -> Self {
        Self {
            config: SiteConfig::default(),
            procedures: Vec::new(),
            encoder: None,
            middleware_chain: MiddlewareChain::new(),
            metrics: false,
            observability_config: None,
        }
    }

    /// Replace all settings at once
    pub fn config(mut self, config: SiteConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.config.summary = summary.into();
        self
    }

    /// Turn diagnostic mode on or off
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Read diagnostic mode from `POLYRPC_DEBUG`
    pub fn debug_from_env(mut self) -> Self {
        self.config.debug = debug_from_env();
        self
    }

    /// Set the batch processing mode
    pub fn batch_mode(mut self, mode: BatchMode) -> Self {
        self.config.batch_mode = mode;
        self
    }

    /// Set the maximum batch size limit
    pub fn max_batch_size(mut self, max_size: usize) -> Self {
        self.config.max_batch_size = Some(max_size);
        self
    }

    /// Replace the default result encoder
    pub fn encoder(mut self, encoder: impl ResultEncoder + 'static) -> Self {
        self.encoder = Some(Arc::new(encoder));
        self
    }

    /// Register a procedure; a later procedure with the same name wins
    pub fn procedure(mut self, procedure: Procedure) -> Self {
        self.procedures.push(procedure);
        self
    }

    /// Add middleware to the site
    pub fn use_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware_chain.add(middleware);
        self
    }

    /// Add sync middleware to the site
    pub fn use_sync_middleware<T: SyncMiddleware + 'static>(mut self, middleware: T) -> Self {
        self.middleware_chain.add_sync(middleware);
        self
    }

    /// Record dispatch metrics on the global meter provider
    pub fn with_metrics(mut self) -> Self {
        self.metrics = true;
        self
    }

    /// Initialize OpenTelemetry when the site is built; implies metrics
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self.metrics = true;
        self
    }

    /// Rename the self-description procedure
    pub fn describe_method(mut self, method: impl Into<String>) -> Self {
        self.config.describe_method = method.into();
        self
    }

    /// Build the site
    ///
    /// # Errors
    ///
    /// Fails only when observability was requested and could not be
    /// initialized.
    pub fn build(self) -> Result<JsonRpcSite> {
        if let Some(config) = self.observability_config {
            polyrpc_core::init_observability(config).map_err(|e| {
                Error::Internal(format!("Failed to initialize observability: {}", e))
            })?;
        }

        let config = self.config;
        let registry = Registry::new();
        for procedure in self.procedures {
            registry.register(procedure);
        }

        let info = Arc::new(ServiceInfo::new(
            config.name.clone(),
            config.version.clone(),
            config.summary.clone(),
        ));
        registry.register(
            DescribeHandler::new(Arc::clone(&info), &registry)
                .procedure(config.describe_method.clone()),
        );

        let mut dispatcher = Dispatcher::new(registry.clone())
            .with_middleware(self.middleware_chain)
            .with_debug(config.debug);
        if let Some(encoder) = self.encoder {
            dispatcher = dispatcher.with_encoder(encoder);
        }
        if self.metrics {
            dispatcher = dispatcher.with_metrics(Arc::new(DispatchMetrics::new(config.name.clone())));
        }

        tracing::info!(
            site = %config.name,
            procedures = registry.len(),
            debug = config.debug,
            "JSON-RPC site built"
        );

        Ok(JsonRpcSite {
            batch: BatchProcessor::with_limit(config.batch_mode, config.max_batch_size),
            config: Arc::new(config),
            registry,
            dispatcher,
            info,
        })
    }
}

impl Default for SiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::DefaultEncoder;
    use crate::procedure::from_fn;
    use serde_json::json;

    #[test]
    fn test_site_config_defaults() {
        let config = SiteConfig::default();
        assert_eq!(config.name, "polyrpc");
        assert_eq!(config.version, "1.0");
        assert_eq!(config.summary, "A JSON-RPC Site");
        assert_eq!(config.describe_method, "system.describe");
        assert_eq!(config.batch_mode, BatchMode::Parallel);
        assert_eq!(config.max_batch_size, None);
        assert!(!config.debug);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" yes "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_builder_registers_describe_procedure() {
        let site = SiteBuilder::new()
            .procedure(Procedure::new("ping", from_fn(|_, _| async { Ok(json!("pong")) })))
            .build()
            .unwrap();

        assert!(site.registry().contains("ping"));
        assert!(site.registry().contains("system.describe"));
        assert_eq!(site.registry().len(), 2);
    }

    #[test]
    fn test_builder_settings() {
        let site = SiteBuilder::new()
            .name("calculator")
            .version("2.0")
            .summary("Arithmetic")
            .debug(true)
            .batch_mode(BatchMode::Sequential)
            .max_batch_size(10)
            .describe_method("calc.describe")
            .encoder(DefaultEncoder)
            .build()
            .unwrap();

        let config = site.config();
        assert_eq!(config.name, "calculator");
        assert_eq!(config.version, "2.0");
        assert!(config.debug);
        assert_eq!(config.max_batch_size, Some(10));
        assert!(site.registry().contains("calc.describe"));
        assert!(!site.registry().contains("system.describe"));
    }

    #[test]
    fn test_builder_with_metrics() {
        let site = SiteBuilder::new().with_metrics().build().unwrap();
        assert!(site.dispatcher().metrics().is_some());

        let site = SiteBuilder::new().build().unwrap();
        assert!(site.dispatcher().metrics().is_none());
    }

    #[test]
    fn test_later_procedure_replaces_earlier() {
        let site = SiteBuilder::new()
            .procedure(Procedure::new("x", from_fn(|_, _| async { Ok(json!(1)) })).summary("first"))
            .procedure(Procedure::new("x", from_fn(|_, _| async { Ok(json!(2)) })).summary("second"))
            .build()
            .unwrap();

        assert_eq!(site.registry().get("x").unwrap().summary_text(), "second");
    }
}

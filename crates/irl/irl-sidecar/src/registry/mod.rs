//! # `registry`
//!
//! Integration rule sets and API key grants consulted by the verify
//! endpoint. A [`Registry`] is immutable once built; [`RegistryHandle`]
//! publishes the current one and swaps in a replacement atomically, so a
//! request always sees one registry in full.
//!
//! ## File format
//!
//! ```toml
//! require_api_key = false
//!
//! [integrations.python_qa]
//! require_api_key = false
//! forward_to = "http://localhost:8080/ingest"
//! rules = [
//!     { kind = "required", field = "total" },
//!     { kind = "non_negative", field = "total" },
//!     { kind = "type", field = "items", expected = "array" },
//! ]
//!
//! [api_keys]
//! "key-123" = ["python_qa", "shopify"]
//! ```

pub mod grants;
pub mod rules;

use std::{
    collections::HashMap,
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
};

use arc_swap::ArcSwap;
use serde::Deserialize;
use tracing::{
    info,
    warn,
};
use url::Url;

pub use grants::{
    ApiKeyGrants,
    Denial,
};
pub use rules::{
    JsonType,
    Rule,
    RuleSet,
    RuleSpec,
};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to read registry file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse registry file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid rule: {0}")]
    InvalidRule(String),
    #[error("Invalid integration '{name}': {reason}")]
    InvalidIntegration { name: String, reason: String },
}

/// On-disk representation of a [`Registry`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryFile {
    #[serde(default)]
    pub require_api_key: bool,
    #[serde(default)]
    pub integrations: HashMap<String, IntegrationSpec>,
    #[serde(default)]
    pub api_keys: HashMap<String, Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntegrationSpec {
    #[serde(default)]
    pub require_api_key: bool,
    #[serde(default)]
    pub forward_to: Option<String>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// Everything the sidecar knows about one integration.
#[derive(Debug, Default)]
pub struct IntegrationRules {
    pub rules: RuleSet,
    pub require_api_key: bool,
    /// Downstream system of record accepted payloads are posted to.
    pub forward_to: Option<Url>,
}

impl IntegrationRules {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    pub fn with_api_key_required(mut self, required: bool) -> Self {
        self.require_api_key = required;
        self
    }

    pub fn with_forward_to(mut self, url: Url) -> Self {
        self.forward_to = Some(url);
        self
    }
}

/// Rule sets by integration name plus the key grants.
#[derive(Debug, Default)]
pub struct Registry {
    integrations: HashMap<String, IntegrationRules>,
    grants: ApiKeyGrants,
    require_api_key: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_integration(mut self, name: impl Into<String>, rules: IntegrationRules) -> Self {
        self.integrations.insert(name.into(), rules);
        self
    }

    pub fn with_grants(mut self, grants: ApiKeyGrants) -> Self {
        self.grants = grants;
        self
    }

    /// Require a key for every integration, whatever its own setting.
    pub fn with_require_api_key(mut self, required: bool) -> Self {
        self.require_api_key = required;
        self
    }

    pub fn integration(&self, name: &str) -> Option<&IntegrationRules> {
        self.integrations.get(name)
    }

    pub fn integration_count(&self) -> usize {
        self.integrations.len()
    }

    /// Run the authorization step for an already resolved integration.
    pub fn authorize(
        &self,
        name: &str,
        integration: &IntegrationRules,
        api_key: Option<&str>,
    ) -> Result<(), Denial> {
        let required = self.require_api_key || integration.require_api_key;
        self.grants.authorize(api_key, name, required)
    }

    pub fn from_file(file: RegistryFile) -> Result<Self, RegistryError> {
        let mut registry = Self::new().with_require_api_key(file.require_api_key);

        for (name, spec) in file.integrations {
            if name.is_empty() || name.contains('/') {
                return Err(RegistryError::InvalidIntegration {
                    name,
                    reason: "name must be non-empty and contain no '/'".to_string(),
                });
            }

            let rules = RuleSet::from_specs(spec.rules)?;
            let mut integration =
                IntegrationRules::new(rules).with_api_key_required(spec.require_api_key);

            if let Some(target) = spec.forward_to {
                let url = Url::parse(&target).map_err(|err| {
                    RegistryError::InvalidIntegration {
                        name: name.clone(),
                        reason: format!("forward_to '{target}': {err}"),
                    }
                })?;
                integration = integration.with_forward_to(url);
            }

            registry.integrations.insert(name, integration);
        }

        for (key, scope) in file.api_keys {
            registry.grants.grant(key, scope);
        }

        for name in registry.grants.referenced_integrations() {
            if !registry.integrations.contains_key(name) {
                warn!(integration = name, "API key granted for an unknown integration");
            }
        }

        Ok(registry)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(contents)?;
        Self::from_file(file)
    }

    pub fn from_path(path: &Path) -> Result<Self, RegistryError> {
        let contents = std::fs::read_to_string(path).map_err(|source| {
            RegistryError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_toml_str(&contents)
    }
}

/// Shared, atomically replaceable view of the current [`Registry`].
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    current: Arc<ArcSwap<Registry>>,
    source: Option<PathBuf>,
    require_api_key_override: Option<bool>,
}

impl RegistryHandle {
    /// Handle over a registry built in code. [`RegistryHandle::reload`] is a no-op.
    pub fn new(registry: Registry) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(registry)),
            source: None,
            require_api_key_override: None,
        }
    }

    /// Load the registry file at `path`. When `require_api_key_override` is
    /// set it replaces the file's deployment-wide setting on every load.
    pub fn from_path(
        path: impl Into<PathBuf>,
        require_api_key_override: Option<bool>,
    ) -> Result<Self, RegistryError> {
        let path = path.into();
        let registry = Self::read(&path, require_api_key_override)?;
        info!(
            path = %path.display(),
            integrations = registry.integration_count(),
            "Loaded registry"
        );
        Ok(Self {
            current: Arc::new(ArcSwap::from_pointee(registry)),
            source: Some(path),
            require_api_key_override,
        })
    }

    fn read(path: &Path, require_api_key_override: Option<bool>) -> Result<Registry, RegistryError> {
        let mut registry = Registry::from_path(path)?;
        if let Some(required) = require_api_key_override {
            registry.require_api_key = required;
        }
        Ok(registry)
    }

    /// Snapshot of the current registry.
    pub fn load(&self) -> Arc<Registry> {
        self.current.load_full()
    }

    /// Replace the current registry.
    pub fn store(&self, registry: Registry) {
        self.current.store(Arc::new(registry));
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Re-read the source file and swap it in. On error the current
    /// registry stays in place.
    pub fn reload(&self) -> Result<(), RegistryError> {
        let Some(path) = &self.source else {
            return Ok(());
        };

        match Self::read(path, self.require_api_key_override) {
            Ok(registry) => {
                let integrations = registry.integration_count();
                self.store(registry);
                metrics::counter!("irl_registry_reloads_total", "result" => "ok").increment(1);
                info!(path = %path.display(), integrations, "Reloaded registry");
                Ok(())
            }
            Err(err) => {
                metrics::counter!("irl_registry_reloads_total", "result" => "error").increment(1);
                warn!(path = %path.display(), error = %err, "Registry reload failed, keeping previous registry");
                Err(err)
            }
        }
    }
}

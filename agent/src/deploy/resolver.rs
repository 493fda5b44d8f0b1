//! Project and chain configuration lookup

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::config::store::ConfigStore;
use crate::deploy::models::DeploymentSpec;

pub const CHAIN_KEY_PREFIX: &str = "DEPLOYMENT_CHAIN_";
pub const DEFAULT_CHAIN_KEY: &str = "DEPLOYMENT_CHAIN_DEFAULT";
pub const PATH_SUFFIX: &str = "_PATH";
pub const COMMANDS_SUFFIX: &str = "_COMMANDS";

/// Turn an identifier into a configuration key prefix: `my-app` -> `MY_APP`
pub fn normalize_identifier(id: &str) -> String {
    id.trim().replace('-', "_").to_uppercase()
}

/// Configuration key of a chain; `None` selects the default chain
pub fn chain_key(name: Option<&str>) -> String {
    match name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => format!("{}{}", CHAIN_KEY_PREFIX, normalize_identifier(name)),
        None => DEFAULT_CHAIN_KEY.to_string(),
    }
}

/// Resolves project and chain definitions from a [`ConfigStore`]
///
/// Nothing is cached: every call reads the store again.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn ConfigStore>,
    chain_fallback: bool,
}

impl Resolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            chain_fallback: false,
        }
    }

    /// Run the default chain when a named chain key is missing
    pub fn with_chain_fallback(mut self, enabled: bool) -> Self {
        self.chain_fallback = enabled;
        self
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    fn value(&self, key: &str) -> Option<String> {
        self.store.get(key).filter(|value| !value.trim().is_empty())
    }

    /// Resolve a project's deployment spec
    ///
    /// Returns `None` when either `{PREFIX}_PATH` or `{PREFIX}_COMMANDS` is
    /// missing or blank. The working directory is not checked here.
    pub fn resolve_project(&self, project_id: &str) -> Option<DeploymentSpec> {
        let prefix = normalize_identifier(project_id);
        let path = self.value(&format!("{}{}", prefix, PATH_SUFFIX))?;
        let commands = self.value(&format!("{}{}", prefix, COMMANDS_SUFFIX))?;

        Some(DeploymentSpec {
            working_directory: PathBuf::from(path.trim()),
            commands: commands
                .split(';')
                .map(|command| command.trim().to_string())
                .collect(),
        })
    }

    /// Resolve the members of a chain by its configuration key
    pub fn resolve_chain(&self, chain_key: &str) -> Option<Vec<String>> {
        let raw = match self.value(chain_key) {
            Some(raw) => raw,
            None if self.chain_fallback && chain_key != DEFAULT_CHAIN_KEY => {
                debug!(chain = chain_key, "Chain not configured, falling back to default chain");
                self.value(DEFAULT_CHAIN_KEY)?
            }
            None => return None,
        };

        let members = split_members(&raw);
        (!members.is_empty()).then_some(members)
    }

    /// Resolve a chain key without the default-chain fallback
    pub fn resolve_chain_exact(&self, chain_key: &str) -> Option<Vec<String>> {
        let members = split_members(&self.value(chain_key)?);
        (!members.is_empty()).then_some(members)
    }
}

fn split_members(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|member| !member.is_empty())
        .map(str::to_string)
        .collect()
}

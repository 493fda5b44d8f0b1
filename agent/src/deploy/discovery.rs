//! Enumerate configured projects and chains

use std::collections::BTreeMap;
use std::path::Path;

use crate::deploy::models::DeploymentSpec;
use crate::deploy::resolver::{Resolver, CHAIN_KEY_PREFIX, PATH_SUFFIX};

/// A project found by scanning configuration keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredProject {
    pub project_id: String,
    pub spec: DeploymentSpec,
    pub directory_exists: bool,
}

/// A chain found by scanning configuration keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredChain {
    pub key: String,
    pub members: Vec<String>,
}

/// Every `*_PATH` key whose project resolves, sorted by project id
pub async fn list_projects(resolver: &Resolver) -> Vec<DiscoveredProject> {
    let mut projects = Vec::new();
    for (project_id, spec) in resolved_projects(resolver) {
        let directory_exists = directory_exists(&spec.working_directory).await;
        projects.push(DiscoveredProject {
            project_id,
            spec,
            directory_exists,
        });
    }
    projects
}

fn resolved_projects(resolver: &Resolver) -> Vec<(String, DeploymentSpec)> {
    let mut projects: Vec<(String, DeploymentSpec)> = resolver
        .store()
        .keys()
        .into_iter()
        .filter_map(|key| {
            let prefix = key.strip_suffix(PATH_SUFFIX)?;
            if prefix.is_empty() {
                return None;
            }
            let project_id = prefix.to_lowercase();
            let spec = resolver.resolve_project(&project_id)?;
            Some((project_id, spec))
        })
        .collect();

    projects.sort_by(|a, b| a.0.cmp(&b.0));
    projects.dedup_by(|a, b| a.0 == b.0);
    projects
}

/// Every `DEPLOYMENT_CHAIN_*` key that resolves, keyed by lower-case name
pub fn list_chains(resolver: &Resolver) -> BTreeMap<String, DiscoveredChain> {
    resolver
        .store()
        .keys()
        .into_iter()
        .filter_map(|key| {
            let name = key.strip_prefix(CHAIN_KEY_PREFIX)?;
            if name.is_empty() {
                return None;
            }
            let name = name.to_lowercase();
            let members = resolver.resolve_chain_exact(&key)?;
            Some((name, DiscoveredChain { key, members }))
        })
        .collect()
}

/// Number of resolvable projects, without touching the filesystem
pub fn project_count(resolver: &Resolver) -> usize {
    resolved_projects(resolver).len()
}

/// Whether `path` exists and is a directory
pub async fn directory_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

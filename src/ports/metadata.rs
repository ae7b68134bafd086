//! Remote metadata resolution (canonical names, default branches)

use anyhow::Result;
use std::collections::HashMap;

/// What the hosting service knows about a repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryMetadata {
    pub owner: String,
    pub name: String,
    /// Canonical clone URL, after renames and transfers
    pub canonical_url: Option<String>,
    pub default_branch: Option<String>,
}

impl RepositoryMetadata {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

pub trait MetadataResolver: Send + Sync {
    /// Look up `owner/name`. `Ok(None)` means the service does not know it.
    fn resolve(&self, owner: &str, name: &str) -> Result<Option<RepositoryMetadata>>;
}

/// Resolver for runs without network access; knows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineResolver;

impl MetadataResolver for OfflineResolver {
    fn resolve(&self, _owner: &str, _name: &str) -> Result<Option<RepositoryMetadata>> {
        Ok(None)
    }
}

/// Resolver backed by a fixed table, keyed by lower-cased `owner/name`
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<String, RepositoryMetadata>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, owner: &str, name: &str, metadata: RepositoryMetadata) -> Self {
        self.entries
            .insert(format!("{owner}/{name}").to_lowercase(), metadata);
        self
    }
}

impl MetadataResolver for StaticResolver {
    fn resolve(&self, owner: &str, name: &str) -> Result<Option<RepositoryMetadata>> {
        Ok(self
            .entries
            .get(&format!("{owner}/{name}").to_lowercase())
            .cloned())
    }
}

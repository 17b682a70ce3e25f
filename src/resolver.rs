//! Application identity resolution
//!
//! Maps an opaque application id to its app, space and org names through an
//! external [`AppLookup`]. Successful lookups are memoized for the lifetime of
//! the process; failures are never cached, so the next occurrence of the same
//! id retries the lookup.

use async_trait::async_trait;
use std::collections::HashMap;

/// Names and ids of an application and the space and org it lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub app_name: String,
    pub app_id: String,
    pub space_name: String,
    pub space_id: String,
    pub org_name: String,
    pub org_id: String,
}

impl ResolvedIdentity {
    /// Tally key for the apps dimension: `org/space/app`
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.org_name, self.space_name, self.app_name)
    }
}

/// What the external lookup returns for an application id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub app_name: String,
    pub space_name: String,
    pub space_id: String,
    pub org_name: String,
    pub org_id: String,
}

pub type LookupError = Box<dyn std::error::Error + Send + Sync>;

/// External service that can describe an application by id
#[async_trait]
pub trait AppLookup: Send + Sync {
    async fn lookup_app(&self, app_id: &str) -> Result<AppInfo, LookupError>;
}

#[derive(Debug, thiserror::Error)]
#[error("failed to resolve app {app_id}: {source}")]
pub struct ResolutionFailed {
    pub app_id: String,
    #[source]
    pub source: LookupError,
}

/// Write-through, never-evicting cache of resolved identities
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: HashMap<String, ResolvedIdentity>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached identity for `app_id`, or look it up and cache it
    ///
    /// Callers serialize access (the cache lives behind the aggregator lock),
    /// so concurrent misses for the same id cannot both insert.
    pub async fn resolve(
        &mut self,
        app_id: &str,
        lookup: &dyn AppLookup,
    ) -> Result<&ResolvedIdentity, ResolutionFailed> {
        if !self.entries.contains_key(app_id) {
            let info = lookup
                .lookup_app(app_id)
                .await
                .map_err(|source| ResolutionFailed {
                    app_id: app_id.to_string(),
                    source,
                })?;

            log::debug!(
                "Resolved app {} -> {}/{}/{}",
                app_id,
                info.org_name,
                info.space_name,
                info.app_name
            );

            self.entries.insert(
                app_id.to_string(),
                ResolvedIdentity {
                    app_name: info.app_name,
                    app_id: app_id.to_string(),
                    space_name: info.space_name,
                    space_id: info.space_id,
                    org_name: info.org_name,
                    org_id: info.org_id,
                },
            );
        }

        Ok(&self.entries[app_id])
    }

    pub fn get(&self, app_id: &str) -> Option<&ResolvedIdentity> {
        self.entries.get(app_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

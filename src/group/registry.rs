//! Group Registry
//!
//! Explicit, injectable mapping from group name to group. Servers and
//! peers receive a handle to it rather than reaching for process-wide state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::Group;
use crate::cache::GroupStatsSnapshot;
use crate::domain::Getter;
use crate::error::{Error, Result};

/// Name → group mapping. Lookups share the lock, registration excludes.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a group, replacing any group of the same name.
    pub fn new_group(
        &self,
        name: impl Into<String>,
        cache_bytes: u64,
        getter: Arc<dyn Getter>,
    ) -> Arc<Group> {
        let group = Arc::new(Group::new(name.into(), cache_bytes, getter));
        let previous = self
            .groups
            .write()
            .insert(group.name().to_string(), Arc::clone(&group));

        if previous.is_some() {
            info!(group = %group.name(), "replaced existing group registration");
        } else {
            info!(group = %group.name(), cache_bytes, "registered group");
        }
        group
    }

    /// Start building a group that registers itself here.
    pub fn builder(&self, name: impl Into<String>) -> GroupBuilder<'_> {
        GroupBuilder {
            registry: self,
            name: name.into(),
            cache_bytes: crate::cache::DEFAULT_CACHE_BYTES,
            getter: None,
        }
    }

    /// Look up a registered group.
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Registered group names, sorted
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    /// Stats of every group, sorted by name.
    pub fn snapshots(&self) -> Vec<GroupStatsSnapshot> {
        let groups: Vec<Arc<Group>> = self.groups.read().values().cloned().collect();
        let mut snapshots: Vec<_> = groups.iter().map(|g| g.stats()).collect();
        snapshots.sort_by(|a, b| a.group.cmp(&b.group));
        snapshots
    }
}

/// Builder validating group construction before registration.
pub struct GroupBuilder<'a> {
    registry: &'a GroupRegistry,
    name: String,
    cache_bytes: u64,
    getter: Option<Arc<dyn Getter>>,
}

impl GroupBuilder<'_> {
    /// Local cache capacity in bytes (0 = unbounded)
    pub fn cache_bytes(mut self, cache_bytes: u64) -> Self {
        self.cache_bytes = cache_bytes;
        self
    }

    /// Data source consulted on misses
    pub fn getter(mut self, getter: Arc<dyn Getter>) -> Self {
        self.getter = Some(getter);
        self
    }

    /// Register the group; fails without a name or a getter.
    pub fn build(self) -> Result<Arc<Group>> {
        if self.name.is_empty() {
            return Err(Error::Config("group name must not be empty".into()));
        }
        let getter = self.getter.ok_or_else(|| Error::MissingGetter {
            group: self.name.clone(),
        })?;
        Ok(self
            .registry
            .new_group(self.name, self.cache_bytes, getter))
    }
}

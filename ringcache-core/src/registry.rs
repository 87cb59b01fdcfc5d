//! Process-wide group registry.
//!
//! Groups are found by name from anywhere in the process (a peer RPC
//! handler only has a group name off the wire), so some shared lookup table
//! is unavoidable. Rather than reaching for a `static`/`lazy_static`, a
//! binary constructs one [`GroupRegistry`] at startup and threads it
//! through explicitly.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::getter::Getter;
use crate::group::Group;

/// Name -> Group lookup table. Read-dominant (peer RPC handlers look groups
/// up far more often than a new one is created), so a plain `RwLock` over a
/// `HashMap` is sufficient.
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        GroupRegistry {
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a group and registers it under `name`. A group name is
    /// unique process-wide; registering the same name twice replaces the
    /// previous entry.
    pub fn new_group(
        &self,
        name: impl Into<String>,
        main_max_bytes: i64,
        hot_max_bytes: i64,
        getter: Arc<dyn Getter>,
    ) -> Arc<Group> {
        let name = name.into();
        let group = Arc::new(Group::new(name.clone(), main_max_bytes, hot_max_bytes, getter));
        self.groups.write().insert(name, Arc::clone(&group));
        group
    }

    /// Looks up a previously created group by name.
    pub fn get(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::getter::GetterFunc;
    use ringcache_common::Error;

    fn noop_getter() -> Arc<dyn Getter> {
        Arc::new(GetterFunc(|key: &str| Err(Error::NotFound(key.to_string()))))
    }

    #[test]
    fn new_group_is_findable_by_name() {
        let registry = GroupRegistry::new();
        registry.new_group("scores", 1024, 1024, noop_getter());
        assert!(registry.get("scores").is_some());
        assert!(registry.get("missing").is_none());
    }
}

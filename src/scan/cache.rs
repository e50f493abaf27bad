//! Scan-wide listing cache and resource index.

use crate::checks::types::Gvr;
use parking_lot::Mutex;
use serde_json::Value as Json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Default)]
struct CacheState {
    lists: HashMap<Gvr, Arc<Vec<Json>>>,
    gvrs: BTreeMap<String, String>,
}

/// Objects listed during one scan, keyed by resource type, plus the
/// `"apiVersion/Kind"` to GVR index. Failed listings are not cached.
#[derive(Default)]
pub struct ResourceCache {
    state: Mutex<CacheState>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, gvr: &Gvr) -> Option<Arc<Vec<Json>>> {
        self.state.lock().lists.get(gvr).cloned()
    }

    pub fn insert(&self, gvr: &Gvr, objects: Vec<Json>) -> Arc<Vec<Json>> {
        let objects = Arc::new(objects);
        self.state.lock().lists.insert(gvr.clone(), Arc::clone(&objects));
        objects
    }

    /// Index a resource type. The first mapping for a key is kept.
    pub fn record_gvr(&self, resource: &str, gvr: &Gvr) {
        self.state
            .lock()
            .gvrs
            .entry(resource.to_string())
            .or_insert_with(|| gvr.to_string());
    }

    pub fn gvrs(&self) -> BTreeMap<String, String> {
        self.state.lock().gvrs.clone()
    }

    /// Number of resource types listed so far.
    pub fn len(&self) -> usize {
        self.state.lock().lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_and_get_share_objects() {
        let cache = ResourceCache::new();
        let gvr = Gvr::new("apps", "v1", "deployments");
        assert!(cache.get(&gvr).is_none());

        let stored = cache.insert(&gvr, vec![json!({"kind": "Deployment"})]);
        let fetched = cache.get(&gvr).unwrap();
        assert!(Arc::ptr_eq(&stored, &fetched));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_gvr_index_keeps_first() {
        let cache = ResourceCache::new();
        cache.record_gvr("apps/v1/Deployment", &Gvr::new("apps", "v1", "deployments"));
        cache.record_gvr("apps/v1/Deployment", &Gvr::new("apps", "v1", "other"));
        assert_eq!(
            cache.gvrs().get("apps/v1/Deployment").map(String::as_str),
            Some("apps/v1/deployments")
        );
    }
}

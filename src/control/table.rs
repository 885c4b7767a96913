//! Mounted proxies, keyed by path prefix.
//!
//! # Design Decisions
//! - Insert-only: a prefix keeps the same [`Proxy`] for the life of the
//!   process, reconfiguration only swaps its harness
//! - Lookups share a read lock; create-or-update holds the write lock for
//!   the whole decision
//! - Longest matching prefix wins

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::harness::Harness;
use crate::proxy::Proxy;

/// Result of [`ProxyTable::bind`].
#[derive(Debug, Clone)]
pub enum Binding {
    /// A new proxy was mounted.
    Created(Arc<Proxy>),
    /// The existing proxy got a new harness.
    Updated(Arc<Proxy>),
}

impl Binding {
    pub fn proxy(&self) -> &Arc<Proxy> {
        match self {
            Binding::Created(proxy) | Binding::Updated(proxy) => proxy,
        }
    }
}

/// One row of the mount listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountInfo {
    pub prefix: String,
    pub target: String,
    pub resource_type: String,
}

/// Prefix → proxy table.
#[derive(Debug, Default)]
pub struct ProxyTable {
    mounts: RwLock<BTreeMap<String, Arc<Proxy>>>,
}

impl ProxyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Proxy responsible for `path`, if any.
    pub async fn resolve(&self, path: &str) -> Option<Arc<Proxy>> {
        let mounts = self.mounts.read().await;
        mounts
            .iter()
            .filter(|(prefix, _)| covers(prefix, path))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, proxy)| proxy.clone())
    }

    /// Attach `harness` to the proxy mounted at `prefix`, mounting the
    /// proxy produced by `build` first if there is none.
    pub async fn bind<F>(&self, prefix: &str, resource_type: &str, harness: Arc<dyn Harness>, build: F) -> Binding
    where
        F: FnOnce() -> Proxy,
    {
        let mut mounts = self.mounts.write().await;
        match mounts.get(prefix) {
            Some(proxy) => {
                proxy.set_harness(resource_type, harness);
                Binding::Updated(proxy.clone())
            }
            None => {
                let proxy = Arc::new(build().with_harness(resource_type, harness));
                mounts.insert(prefix.to_string(), proxy.clone());
                Binding::Created(proxy)
            }
        }
    }

    /// Every mount, sorted by prefix.
    pub async fn list(&self) -> Vec<MountInfo> {
        let mounts = self.mounts.read().await;
        mounts
            .iter()
            .map(|(prefix, proxy)| MountInfo {
                prefix: prefix.clone(),
                target: proxy.director().target().to_string(),
                resource_type: proxy.harness().resource_type.clone(),
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.mounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.mounts.read().await.is_empty()
    }
}

/// `path` is the prefix itself or lies below it.
fn covers(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

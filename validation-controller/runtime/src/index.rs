use crate::core::{
    k8s::{
        gateway::{
            Gateway, MatchableHttpGateway, RouteOption, RouteTable, VirtualHostOption,
            VirtualService,
        },
        gloo::{Endpoint, Upstream},
        Secret,
    },
    Kind, Resource, ResourceId, Snapshot,
};
use ahash::AHashSet;
use kubert::index::{IndexNamespacedResource, NamespacedRemoved};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

pub type SharedIndex = Arc<RwLock<SnapshotIndex>>;

/// Maintains the cluster's current snapshot from resource watches.
#[derive(Debug)]
pub struct SnapshotIndex {
    snapshot: Snapshot,

    /// Kinds whose initial list has not yet been received.
    pending: AHashSet<Kind>,

    dirty: bool,
}

// === impl SnapshotIndex ===

impl SnapshotIndex {
    pub fn shared(watched: impl IntoIterator<Item = Kind>) -> SharedIndex {
        Arc::new(RwLock::new(Self {
            snapshot: Snapshot::default(),
            pending: watched.into_iter().collect(),
            dirty: true,
        }))
    }

    /// Returns the snapshot if it changed since it was last taken. Nothing is
    /// returned until every watched kind has been listed.
    pub fn take_snapshot(&mut self) -> Option<Snapshot> {
        if !self.pending.is_empty() || !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.snapshot.clone())
    }

    fn apply_resource(&mut self, resource: impl Into<Resource>) {
        self.snapshot.upsert(resource);
        self.dirty = true;
    }

    fn delete_resource(&mut self, id: ResourceId) {
        if self.snapshot.remove(&id) {
            self.dirty = true;
        }
    }

    fn reset_kind<T: Into<Resource>>(
        &mut self,
        kind: Kind,
        resources: Vec<T>,
        removed: NamespacedRemoved,
    ) {
        for (namespace, names) in removed {
            for name in names {
                self.delete_resource(ResourceId::new(kind, &namespace, name));
            }
        }
        for resource in resources {
            self.apply_resource(resource);
        }
        if self.pending.remove(&kind) {
            debug!(%kind, "Initial list received");
            self.dirty = true;
        }
    }
}

macro_rules! index_kind {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl IndexNamespacedResource<$ty> for SnapshotIndex {
                fn apply(&mut self, resource: $ty) {
                    self.apply_resource(resource);
                }

                fn delete(&mut self, namespace: String, name: String) {
                    self.delete_resource(ResourceId::new(Kind::$ty, namespace, name));
                }

                fn reset(&mut self, resources: Vec<$ty>, removed: NamespacedRemoved) {
                    self.reset_kind(Kind::$ty, resources, removed);
                }
            }
        )+
    };
}

index_kind!(
    Gateway,
    MatchableHttpGateway,
    VirtualService,
    RouteTable,
    RouteOption,
    VirtualHostOption,
    Upstream,
    Endpoint,
    Secret,
);

//! Which peer supplied each block that is still being processed or is
//! held as an orphan.
//!
//! Shared by the block task and the notification tasks. Everything goes
//! through one mutex; [`BlockOrigins::lock`] exposes it for callers that
//! need a lookup and a removal to happen atomically.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use tarn_core::types::Hash256;
use tarn_network::PeerSession;

pub type OriginMap = HashMap<Hash256, Arc<dyn PeerSession>>;

#[derive(Default)]
pub struct BlockOrigins {
    inner: Mutex<OriginMap>,
}

impl BlockOrigins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, hash: Hash256, peer: Arc<dyn PeerSession>) {
        self.inner.lock().insert(hash, peer);
    }

    pub fn remove(&self, hash: &Hash256) -> Option<Arc<dyn PeerSession>> {
        self.inner.lock().remove(hash)
    }

    pub fn get(&self, hash: &Hash256) -> Option<Arc<dyn PeerSession>> {
        self.inner.lock().get(hash).cloned()
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.inner.lock().contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Hold the map lock for a compound operation.
    pub fn lock(&self) -> MutexGuard<'_, OriginMap> {
        self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_core::types::ServiceFlags;
    use tarn_network::{NetworkConfig, Peer, PeerId};

    #[test]
    fn insert_get_remove() {
        let origins = BlockOrigins::new();
        let (peer, _rx) = Peer::new(
            PeerId(3),
            "10.0.0.3:8733".parse().unwrap(),
            ServiceFlags::NODE_NETWORK,
            0,
            &NetworkConfig::default(),
        );
        let hash = Hash256([1; 32]);

        origins.insert(hash, peer);
        assert!(origins.contains(&hash));
        assert_eq!(origins.get(&hash).map(|p| p.id()), Some(PeerId(3)));
        assert_eq!(origins.len(), 1);

        assert!(origins.remove(&hash).is_some());
        assert!(origins.remove(&hash).is_none());
        assert!(origins.is_empty());
    }
}

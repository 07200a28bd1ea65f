// Revocable, non-owning references to record payloads for display surfaces.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

#[derive(Clone, Debug)]
pub struct PreviewHandle {
    id: u64,
    target: Weak<[u8]>,
    revoked: Arc<AtomicBool>,
}

impl PreviewHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Opaque reference string for the display layer, e.g. `preview:7`.
    pub fn uri(&self) -> String {
        format!("preview:{}", self.id)
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }

    /// The payload, unless revoked or already dropped by its owner.
    pub fn resolve(&self) -> Option<Arc<[u8]>> {
        if self.is_revoked() {
            return None;
        }
        self.target.upgrade()
    }
}

impl PartialEq for PreviewHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PreviewHandle {}

#[derive(Debug, Default)]
pub struct PreviewRegistry {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, Arc<AtomicBool>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, payload: &Arc<[u8]>) -> PreviewHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let revoked = Arc::new(AtomicBool::new(false));
        self.live.lock().insert(id, revoked.clone());
        PreviewHandle {
            id,
            target: Arc::downgrade(payload),
            revoked,
        }
    }

    /// Returns false if the handle was unknown or already revoked.
    pub fn revoke(&self, id: u64) -> bool {
        match self.live.lock().remove(&id) {
            Some(flag) => {
                flag.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    pub fn revoke_all(&self) -> usize {
        let drained: Vec<_> = self.live.lock().drain().collect();
        for (_, flag) in &drained {
            flag.store(true, Ordering::Release);
        }
        drained.len()
    }

    pub fn live(&self) -> usize {
        self.live.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_until_revoked() {
        let reg = PreviewRegistry::new();
        let payload: Arc<[u8]> = Arc::from(vec![1u8, 2, 3]);
        let h = reg.issue(&payload);
        assert_eq!(h.resolve().as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(reg.revoke(h.id()));
        assert!(h.is_revoked());
        assert!(h.resolve().is_none());
        assert!(!reg.revoke(h.id()));
        // payload is untouched by revocation
        assert_eq!(&*payload, &[1, 2, 3]);
    }

    #[test]
    fn does_not_keep_payload_alive() {
        let reg = PreviewRegistry::new();
        let payload: Arc<[u8]> = Arc::from(vec![9u8; 4]);
        let h = reg.issue(&payload);
        drop(payload);
        assert!(h.resolve().is_none());
        assert!(!h.is_revoked());
    }

    #[test]
    fn revoke_all_clears_registry() {
        let reg = PreviewRegistry::new();
        let payload: Arc<[u8]> = Arc::from(vec![0u8]);
        let a = reg.issue(&payload);
        let b = reg.issue(&payload);
        assert_ne!(a.uri(), b.uri());
        assert_eq!(reg.revoke_all(), 2);
        assert_eq!(reg.live(), 0);
        assert!(a.resolve().is_none() && b.resolve().is_none());
    }
}

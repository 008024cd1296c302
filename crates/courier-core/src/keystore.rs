use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::identity::{Id, Identity};

// In-memory keystore consumed by the wormhole: own signing identities plus
// the public keys of known peers. The persistent keyring is a separate
// subsystem; this is the contract it fills.
#[derive(Clone, Default)]
pub struct Keystore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    identities: HashMap<Id, Identity>,
    public_keys: HashSet<Id>,
}

impl Keystore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_identity(&self, identity: Identity) {
        let mut inner = self.inner.lock().expect("keystore lock");
        inner.identities.insert(identity.id(), identity);
    }

    pub fn save_public_key(&self, id: Id) {
        let mut inner = self.inner.lock().expect("keystore lock");
        inner.public_keys.insert(id);
    }

    pub fn identity(&self, id: &Id) -> Option<Identity> {
        let inner = self.inner.lock().expect("keystore lock");
        inner.identities.get(id).cloned()
    }

    /// Whether `id` is known, as an own identity or a saved peer key.
    pub fn contains(&self, id: &Id) -> bool {
        let inner = self.inner.lock().expect("keystore lock");
        inner.identities.contains_key(id) || inner.public_keys.contains(id)
    }

    pub fn identities(&self) -> Vec<Id> {
        let inner = self.inner.lock().expect("keystore lock");
        inner.identities.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keystore_lookup() {
        let ks = Keystore::new();
        let alice = Identity::generate();
        let bob = Identity::generate();

        ks.save_identity(alice.clone());
        ks.save_public_key(bob.id());

        assert!(ks.identity(&alice.id()).is_some());
        assert!(ks.identity(&bob.id()).is_none());
        assert!(ks.contains(&alice.id()));
        assert!(ks.contains(&bob.id()));
        assert!(!ks.contains(&Identity::generate().id()));
        assert_eq!(ks.identities(), vec![alice.id()]);
    }
}

use std::sync::{Arc, Mutex, PoisonError};

use crate::types::{KeyKind, KeyList};

/// Whole-keyring listings, one slot per [`KeyKind`].
///
/// Locks are only taken to read or replace a slot, never across a gpg
/// call. Two callers missing at the same time both list the keyring and
/// the later store wins.
#[derive(Debug, Default)]
pub struct KeyCache {
    public: Mutex<Option<Arc<KeyList>>>,
    secret: Mutex<Option<Arc<KeyList>>>,
}

impl KeyCache {
    fn slot(&self, kind: KeyKind) -> &Mutex<Option<Arc<KeyList>>> {
        match kind {
            KeyKind::Public => &self.public,
            KeyKind::Secret => &self.secret,
        }
    }

    pub fn get(&self, kind: KeyKind) -> Option<Arc<KeyList>> {
        self.slot(kind)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn store(&self, kind: KeyKind, keys: KeyList) -> Arc<KeyList> {
        let keys = Arc::new(keys);
        *self
            .slot(kind)
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&keys));
        keys
    }

    /// Clears both slots.
    pub fn invalidate(&self) {
        for kind in [KeyKind::Public, KeyKind::Secret] {
            *self
                .slot(kind)
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = None;
        }
    }
}

use std::collections::HashMap;

use domain::nat::entity::{NatBinding, NatKey, NatStore};

/// Process-local NAT translation table.
///
/// Entries live for the process lifetime; flow expiry is handled by
/// the surrounding state lifecycle, not by the store.
#[derive(Debug, Default)]
pub struct MemoryNatStore {
    entries: HashMap<NatKey, NatBinding>,
}

impl MemoryNatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl NatStore for MemoryNatStore {
    fn get(&self, key: &NatKey) -> Option<NatBinding> {
        self.entries.get(key).copied()
    }

    fn put(&mut self, key: NatKey, binding: NatBinding) {
        self.entries.insert(key, binding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::nat::entity::NatKind;

    #[test]
    fn put_then_get() {
        let mut store = MemoryNatStore::new();
        let key = NatKey {
            kind: NatKind::DnatForward,
            protocol: 17,
            nw_src: 1,
            tp_src: 2,
            nw_dst: 3,
            tp_dst: 4,
        };
        assert!(store.get(&key).is_none());
        store.put(
            key,
            NatBinding {
                nw_addr: 9,
                tp_port: 99,
            },
        );
        assert_eq!(store.get(&key).map(|b| b.nw_addr), Some(9));
        assert_eq!(store.len(), 1);
    }
}

#![no_main]

use std::collections::HashMap;

use libfuzzer_sys::fuzz_target;

use domain::nat::engine::{apply_forward, apply_reverse};
use domain::nat::entity::{NatBinding, NatKey, NatStore, NatTarget};
use domain::packet::entity::{FlowMatch, Mac};

#[derive(Default)]
struct MapStore(HashMap<NatKey, NatBinding>);

impl NatStore for MapStore {
    fn get(&self, key: &NatKey) -> Option<NatBinding> {
        self.0.get(key).copied()
    }

    fn put(&mut self, key: NatKey, binding: NatBinding) {
        self.0.insert(key, binding);
    }
}

// Fuzz forward+reverse NAT: for any flow and target set, applying the
// forward rewrite and then the reverse rewrite on the simulated return
// flow must restore the original addresses exactly.
//
// Layout: [0] = dnat flag, [1..14] = flow fields, [14..24] = target
fuzz_target!(|data: &[u8]| {
    if data.len() < 24 {
        return;
    }

    let dnat = data[0] & 1 != 0;
    let mut original = FlowMatch {
        dl_src: Mac::ZERO,
        dl_dst: Mac::ZERO,
        nw_src: u32::from_le_bytes([data[1], data[2], data[3], data[4]]),
        nw_dst: u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
        nw_proto: data[9],
        tp_src: u16::from_le_bytes([data[10], data[11]]),
        tp_dst: u16::from_le_bytes([data[12], data[13]]),
    };
    // Flows without transport ports always carry zeroes, matching
    // what FlowMatch::from_ipv4 produces.
    if !original.has_transport_ports() {
        original.tp_src = 0;
        original.tp_dst = 0;
    }
    let nw_start = u32::from_le_bytes([data[14], data[15], data[16], data[17]]);
    let tp_start = u16::from_le_bytes([data[18], data[19]]).max(1);
    let target = NatTarget {
        nw_start,
        nw_end: nw_start.saturating_add(data[20] as u32),
        tp_start,
        tp_end: tp_start.saturating_add(data[21] as u16),
    };

    let mut store = MapStore::default();
    let mut flow = original.clone();
    apply_forward(&mut store, &mut flow, dnat, &[target]);

    // Repeat application of the same flow reuses the binding.
    let mut again = original.clone();
    apply_forward(&mut store, &mut again, dnat, &[target]);
    assert_eq!(flow, again);

    // Build the return flow and undo the translation.
    let mut ret = FlowMatch {
        dl_src: Mac::ZERO,
        dl_dst: Mac::ZERO,
        nw_src: flow.nw_dst,
        nw_dst: flow.nw_src,
        nw_proto: flow.nw_proto,
        tp_src: flow.tp_dst,
        tp_dst: flow.tp_src,
    };
    assert!(apply_reverse(&store, &mut ret, dnat));
    assert_eq!(ret.nw_src, original.nw_dst);
    assert_eq!(ret.nw_dst, original.nw_src);
    if original.has_transport_ports() {
        assert_eq!(ret.tp_src, original.tp_dst);
        assert_eq!(ret.tp_dst, original.tp_src);
    }

    // An unrelated flow must never hit the translation.
    let mut other = original.clone();
    other.nw_src = other.nw_src.wrapping_add(1);
    other.nw_dst = other.nw_dst.wrapping_add(1);
    let before = other.clone();
    if !apply_reverse(&store, &mut other, dnat) {
        assert_eq!(other, before);
    }
});

#![no_main]

use std::collections::HashMap;

use libfuzzer_sys::fuzz_target;

use domain::common::entity::{Ipv4Cidr, PortId, RuleId};
use domain::condition::entity::Condition;
use domain::nat::entity::{NatBinding, NatKey, NatStore, NatTarget};
use domain::packet::entity::{FlowMatch, Mac};
use domain::rule::engine::ChainEngine;
use domain::rule::entity::{Rule, RuleAction, Verdict};

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

// Fuzz the ChainEngine: arbitrary rules, jumps (including cycles and
// missing targets), NAT actions, then evaluation. Must terminate and
// never panic.
//
// Layout:
//   [0]  = number of chains (1-4)
//   rest = consumed in 14-byte chunks per rule
fuzz_target!(|data: &[u8]| {
    if data.len() < 15 {
        return;
    }

    let num_chains = ((data[0] as usize) % 4) + 1;
    let mut engine = ChainEngine::new();
    for c in 0..num_chains {
        let _ = engine.add_chain(&format!("c{c}"));
    }

    let mut cursor = 1;
    let mut n = 0usize;

    // Parse rules from fuzz data
    while cursor + 14 <= data.len() && n < 48 {
        let chunk = &data[cursor..cursor + 14];
        cursor += 14;

        let verdict = match chunk[0] % 5 {
            0 => Verdict::Accept,
            1 => Verdict::Drop,
            2 => Verdict::Reject,
            3 => Verdict::Return,
            _ => Verdict::Continue,
        };
        let action = match chunk[1] % 4 {
            0 => RuleAction::Literal { verdict },
            // c4 never exists; the missing-target path gets covered.
            1 => RuleAction::Jump {
                target: format!("c{}", chunk[2] % 5),
            },
            2 => RuleAction::ForwardNat {
                dnat: chunk[2] & 1 != 0,
                targets: vec![NatTarget {
                    nw_start: u32::from_le_bytes([chunk[3], chunk[4], chunk[5], chunk[6]]),
                    nw_end: u32::MAX,
                    tp_start: 1,
                    tp_end: u16::MAX,
                }],
                verdict,
            },
            _ => RuleAction::ReverseNat {
                dnat: chunk[2] & 1 != 0,
                verdict,
            },
        };
        let condition = Condition {
            nw_src: (chunk[7] & 1 != 0)
                .then(|| Ipv4Cidr::new(u32::from_le_bytes([chunk[8], chunk[9], 0, 0]), chunk[10] % 33)),
            nw_src_inv: chunk[7] & 2 != 0,
            ..Condition::default()
        };
        let rule = Rule {
            id: RuleId(format!("r{n}")),
            position: (n as u32) + 1,
            condition,
            action,
        };
        // Invalid rules (e.g. a NAT action with a Jump-only verdict)
        // are rejected at add time; both outcomes are fine.
        let _ = engine.add_rule(&format!("c{}", chunk[13] % num_chains as u8), rule);
        n += 1;
    }

    let mut store = MapStore::default();
    let in_port = PortId("in".into());
    let out_port = PortId("out".into());
    for c in 0..num_chains {
        let mut flow = FlowMatch {
            dl_src: Mac::ZERO,
            dl_dst: Mac::BROADCAST,
            nw_src: u32::from_le_bytes([data[1], data[2], data[3], data[4]]),
            nw_dst: u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
            nw_proto: data[9] % 32,
            tp_src: u16::from_le_bytes([data[10], data[11]]),
            tp_dst: u16::from_le_bytes([data[12], data[13]]),
        };
        let _ = engine.evaluate(
            &format!("c{c}"),
            &mut flow,
            &in_port,
            (c & 1 != 0).then_some(&out_port),
            &mut store,
        );
    }
});

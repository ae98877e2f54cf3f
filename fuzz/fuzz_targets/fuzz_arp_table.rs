#![no_main]

use libfuzzer_sys::fuzz_target;

use domain::arp::entity::RouterPort;
use domain::arp::table::{ArpTable, ExpiryTick, Lookup};
use domain::common::entity::{Ipv4Cidr, PortId};
use domain::packet::entity::Mac;

// Fuzz the ArpTable state machine: interleaved lookups, replies,
// retry/expiry ticks, and port purges with a monotonic clock. No
// operation may panic, waiters may only be handed out once, and a
// resolved lookup must return the learned MAC.
//
// Layout: [0..8] = clock step seed, rest in 7-byte ops
fuzz_target!(|data: &[u8]| {
    if data.len() < 15 {
        return;
    }

    let port = RouterPort {
        id: PortId("p0".into()),
        mac: Mac([2, 0, 0, 0, 0, 1]),
        subnet: Ipv4Cidr::new(0x0A00_0000, 8),
        port_addr: 0x0A00_0001,
        local_segment: Ipv4Cidr::new(0x0A00_0000, 16),
    };

    let mut table = ArpTable::new();
    let mut now: u64 = 0;
    let mut handed_out = 0usize;
    let mut queued = 0usize;
    let mut cursor = 8;

    while cursor + 7 <= data.len() {
        let chunk = &data[cursor..cursor + 7];
        cursor += 7;

        // Clock only moves forward, in steps up to ~20 minutes.
        now += u64::from(u16::from_le_bytes([chunk[1], chunk[2]])) * 20;
        // Keep the key space small so operations actually interact.
        let nw_addr = 0x0A00_0000 | u32::from(chunk[3] % 8);
        let mac = Mac([0, 2, 0, 0, 0, chunk[3]]);

        match chunk[0] % 6 {
            0 => {
                if table.lookup(&port, nw_addr, now) == (Lookup::Pending { is_new: true }) {
                    // A fresh pending entry accepts waiters.
                    if table.add_waiter(&port.id, nw_addr, Box::new(|_| {})).is_ok() {
                        queued += 1;
                    }
                }
            }
            1 => {
                let learned = table.process_reply(&port.id, nw_addr, mac, now);
                handed_out += learned.waiters.len();
                // The entry is resolved; the cache must say so.
                match table.lookup(&port, nw_addr, now) {
                    Lookup::Resolved { mac: got, .. } => assert_eq!(got, mac),
                    other => panic!("expected resolved entry, got {other:?}"),
                }
            }
            2 => {
                let _ = table.retry_tick(&port.id, nw_addr, now);
            }
            3 => {
                if let ExpiryTick::Evicted(waiters) = table.expiry_tick(&port.id, nw_addr, now) {
                    handed_out += waiters.len();
                }
            }
            4 => {
                handed_out += table.purge_port(&port.id).len();
            }
            _ => {
                if table.add_waiter(&port.id, nw_addr, Box::new(|_| {})).is_ok() {
                    queued += 1;
                }
            }
        }
        assert!(table.len() <= 8);
    }

    handed_out += table.purge_port(&port.id).len();
    assert!(table.is_empty());
    // Every queued waiter is handed out exactly once.
    assert_eq!(handed_out, queued);
});

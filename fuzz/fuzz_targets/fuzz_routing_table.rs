#![no_main]

use libfuzzer_sys::fuzz_target;

use domain::common::entity::{Ipv4Cidr, PortId};
use domain::route::entity::{NextHop, Route};
use domain::route::table::RoutingTable;

// Fuzz the RoutingTable: add, remove, lookup under arbitrary routes.
//
// Layout:
//   [0]  = number of lookups (1-8)
//   rest = consumed in 12-byte chunks per route
fuzz_target!(|data: &[u8]| {
    if data.len() < 13 {
        return;
    }

    let lookups = ((data[0] as usize) % 8) + 1;
    let mut cursor = 1;
    let mut table = RoutingTable::new();
    let mut routes = Vec::new();

    // Parse routes from fuzz data
    while cursor + 12 <= data.len() && routes.len() < 32 {
        let chunk = &data[cursor..cursor + 12];
        cursor += 12;

        let dst_addr = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let src_addr = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
        let dst_prefix = chunk[8] % 33;
        let src_prefix = chunk[9] % 33;

        let next_hop = match chunk[10] % 3 {
            0 => NextHop::Port {
                port: PortId(format!("p{}", chunk[10] % 4)),
                gateway: (chunk[11] & 1 != 0).then_some(dst_addr ^ 0xFFFF),
            },
            1 => NextHop::Blackhole,
            _ => NextHop::Reject,
        };

        let route = Route {
            src: Ipv4Cidr::new(src_addr, src_prefix),
            src_inv: chunk[11] & 2 != 0,
            dst: Ipv4Cidr::new(dst_addr, dst_prefix),
            next_hop,
            weight: chunk[11] as u32,
        };
        // Duplicates are rejected; that path is worth exercising too.
        if table.add_route(route.clone()).is_ok() {
            routes.push(route);
        }
    }

    // Every lookup result must actually match the queried addresses.
    for i in 0..lookups {
        let nw_src = u32::from_le_bytes([data[0], data[i % data.len()], 0x0A, i as u8]);
        let nw_dst = nw_src.rotate_left(i as u32);
        if let Some(route) = table.lookup(nw_src, nw_dst) {
            assert!(route.dst.contains(nw_dst));
            assert_ne!(route.src.contains(nw_src), route.src_inv);
        }
    }

    // Removal drains the table back to empty.
    for route in &routes {
        let _ = table.remove_route(route);
    }
    assert!(table.is_empty());
});

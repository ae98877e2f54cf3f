//! Loads a YAML snapshot and drives the configured router end to end.

use std::sync::Arc;

use adapters::nat::memory_store::MemoryNatStore;
use adapters::time::mock_reactor::MockReactor;
use adapters::transport::recording_transport::RecordingTransport;
use application::router_service_impl::RouterService;
use domain::common::entity::{PortId, RouterId};
use domain::packet::entity::{
    ArpOp, ArpPdu, EthernetFrame, FramePayload, Ipv4Packet, Mac, Transport,
};
use domain::pipeline::entity::ForwardAction;
use infrastructure::config::RouterConfig;
use infrastructure::metrics::ForwardingMetrics;
use ports::primary::packet_processor_port::PacketProcessorPort;

const SNAPSHOT: &str = r#"
router:
  id: edge-1

ports:
  - id: uplink
    mac: "02:0a:08:06:04:02"
    subnet: "180.0.0.0/24"
    addr: "180.0.0.1"
  - id: tenant
    mac: "02:0a:08:06:04:03"
    subnet: "10.0.2.0/24"
    addr: "10.0.2.1"
    local_segment: "10.0.2.0/26"

routes:
  - dst: "0.0.0.0/0"
    next_hop: { type: port, port: uplink, gateway: "180.0.0.254" }
    weight: 100
  - dst: "10.0.2.0/24"
    next_hop: { type: port, port: tenant }

chains:
  - name: pre_routing
    rules:
      - id: dnat-web
        position: 1
        condition: { nw_dst: "180.0.0.5/32", proto: tcp }
        action:
          type: forward_nat
          dnat: true
          targets: [{ addr: "10.0.2.10", ports: "8080" }]
          verdict: accept
"#;

const CLIENT: u32 = 0xB400_001E; // 180.0.0.30
const FLOATING: u32 = 0xB400_0005; // 180.0.0.5
const SERVER: u32 = 0x0A00_020A; // 10.0.2.10
const TENANT_ADDR: u32 = 0x0A00_0201; // 10.0.2.1

/// Populate a router service from a parsed snapshot.
fn apply(config: &RouterConfig, router: &RouterService) {
    for port in &config.ports {
        router.add_port(port.to_domain().unwrap()).unwrap();
    }
    for route in &config.routes {
        router.add_route(route.to_domain().unwrap()).unwrap();
    }
    for chain in &config.chains {
        router.add_chain(&chain.name).unwrap();
        for rule in &chain.rules {
            router
                .add_rule(&chain.name, rule.to_domain().unwrap())
                .unwrap();
        }
    }
}

#[test]
fn snapshot_configures_a_working_forwarding_plane() {
    let config = RouterConfig::from_yaml(SNAPSHOT).unwrap();
    let transport = Arc::new(RecordingTransport::new());
    let reactor = Arc::new(MockReactor::new());
    let metrics = Arc::new(ForwardingMetrics::new());
    let router = RouterService::new(
        RouterId(config.router.id.clone()),
        Box::new(MemoryNatStore::new()),
        transport.clone(),
        reactor,
        metrics.clone(),
    );
    apply(&config, &router);

    let uplink = PortId("uplink".into());
    let tenant = PortId("tenant".into());
    let uplink_mac = Mac::parse("02:0a:08:06:04:02").unwrap();
    let tenant_mac = Mac::parse("02:0a:08:06:04:03").unwrap();
    let client_mac = Mac::parse("02:00:bb:00:00:01").unwrap();
    let server_mac = Mac::parse("02:00:bb:00:00:0a").unwrap();

    // Seed the ARP cache for the translated destination.
    let reply = EthernetFrame {
        src: server_mac,
        dst: tenant_mac,
        payload: FramePayload::Arp(ArpPdu {
            op: ArpOp::Reply,
            sender_mac: server_mac,
            sender_ip: SERVER,
            target_mac: tenant_mac,
            target_ip: TENANT_ADDR,
        }),
    };
    assert_eq!(
        router.process(&tenant, reply).unwrap(),
        ForwardAction::Consumed
    );

    // A client flow to the floating address is translated and
    // forwarded out the tenant port.
    let frame = EthernetFrame {
        src: client_mac,
        dst: uplink_mac,
        payload: FramePayload::Ipv4(Ipv4Packet {
            nw_src: CLIENT,
            nw_dst: FLOATING,
            protocol: 6,
            transport: Transport::Tcp {
                tp_src: 40000,
                tp_dst: 80,
            },
        }),
    };
    assert_eq!(
        router.process(&uplink, frame).unwrap(),
        ForwardAction::Forward { out_port: tenant }
    );

    let emitted = transport.take();
    assert_eq!(emitted.len(), 1);
    let (_, out) = &emitted[0];
    assert_eq!(out.dst, server_mac);
    let FramePayload::Ipv4(pkt) = &out.payload else {
        panic!("expected ipv4 frame");
    };
    assert_eq!(pkt.nw_dst, SERVER);
    assert_eq!(
        pkt.transport,
        Transport::Tcp {
            tp_src: 40000,
            tp_dst: 8080,
        }
    );

    let text = metrics.encode();
    assert!(text.contains("vrouterd_packets_total"));
    assert!(text.contains("outcome=\"forward\""));
    assert!(text.contains("vrouterd_routes_loaded 2"));
}
